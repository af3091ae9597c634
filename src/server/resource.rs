//! Resource registry for managing collections and auto-generating routes

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use super::handlers::{
    ResourceState, SharedState, create_resource, delete_resource, get_resource, list_resources,
    sort_resources, update_resource,
};
use crate::core::auth::AccessPolicy;
use crate::core::store::Collection;

/// How `GET /api/{plural}` interprets its query string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingMode {
    /// Filtering, sorting, field selection and lenient pagination
    #[default]
    Features,
    /// Strict `page`/`limit` validation only
    Paginated,
}

/// Static description of a REST resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    kind: String,
    singular: String,
    plural: String,
    listing: ListingMode,
    read_policy: AccessPolicy,
    write_policy: AccessPolicy,
}

impl ResourceDescriptor {
    /// `kind` names the record type in cache keys (e.g. `Student`);
    /// `singular` appears in messages; `plural` is the route segment.
    pub fn new(
        kind: impl Into<String>,
        singular: impl Into<String>,
        plural: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            singular: singular.into(),
            plural: plural.into(),
            listing: ListingMode::default(),
            read_policy: AccessPolicy::Public,
            write_policy: AccessPolicy::Public,
        }
    }

    pub fn with_listing(mut self, listing: ListingMode) -> Self {
        self.listing = listing;
        self
    }

    pub fn with_read_policy(mut self, policy: AccessPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub fn with_write_policy(mut self, policy: AccessPolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn singular(&self) -> &str {
        &self.singular
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    pub fn listing(&self) -> ListingMode {
        self.listing
    }

    pub fn read_policy(&self) -> &AccessPolicy {
        &self.read_policy
    }

    pub fn write_policy(&self) -> &AccessPolicy {
        &self.write_policy
    }
}

/// Something that can contribute routes for one resource
pub trait ResourceRoutes: Send + Sync {
    fn descriptor(&self) -> &ResourceDescriptor;

    /// Mutable access so configuration can override policies
    fn descriptor_mut(&mut self) -> &mut ResourceDescriptor;

    /// Build the CRUD and sort routes for this resource
    fn build_routes(&self, shared: &SharedState) -> Router;
}

/// A collection bound to its descriptor
pub struct CollectionResource<C> {
    descriptor: ResourceDescriptor,
    collection: Arc<C>,
}

impl<C: Collection> CollectionResource<C> {
    pub fn new(descriptor: ResourceDescriptor, collection: Arc<C>) -> Self {
        Self {
            descriptor,
            collection,
        }
    }
}

impl<C: Collection> ResourceRoutes for CollectionResource<C> {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    fn descriptor_mut(&mut self) -> &mut ResourceDescriptor {
        &mut self.descriptor
    }

    fn build_routes(&self, shared: &SharedState) -> Router {
        let plural = self.descriptor.plural();
        let state = ResourceState::new(
            Arc::new(self.descriptor.clone()),
            self.collection.clone(),
            shared.clone(),
        );

        Router::new()
            .route(
                &format!("/api/{}", plural),
                get(list_resources::<C>).post(create_resource::<C>),
            )
            .route(
                &format!("/api/{}/{{id}}", plural),
                get(get_resource::<C>)
                    .patch(update_resource::<C>)
                    .delete(delete_resource::<C>),
            )
            .route(
                &format!("/api/sort/{}", plural),
                get(sort_resources::<C>),
            )
            .with_state(state)
    }
}

/// Registry for all resources in the application
#[derive(Default)]
pub struct ResourceRegistry {
    resources: Vec<Box<dyn ResourceRoutes>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource; a later registration with the same plural
    /// replaces the earlier one
    pub fn register(&mut self, resource: Box<dyn ResourceRoutes>) {
        let plural = resource.descriptor().plural().to_string();
        self.resources
            .retain(|existing| existing.descriptor().plural() != plural);
        self.resources.push(resource);
    }

    /// Look a resource up by plural name
    pub fn get_mut(&mut self, plural: &str) -> Option<&mut Box<dyn ResourceRoutes>> {
        self.resources
            .iter_mut()
            .find(|r| r.descriptor().plural() == plural)
    }

    /// Merge the routes of every registered resource
    pub fn build_routes(&self, shared: &SharedState) -> Router {
        self.resources
            .iter()
            .fold(Router::new(), |router, resource| {
                router.merge(resource.build_routes(shared))
            })
    }

    /// Plural names in registration order
    pub fn plurals(&self) -> Vec<&str> {
        self.resources
            .iter()
            .map(|r| r.descriptor().plural())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
