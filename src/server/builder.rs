//! ServerBuilder for fluent API to build HTTP servers

use std::sync::Arc;

use anyhow::Result;
use axum::Json;
use axum::Router;
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use indexmap::IndexMap;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::enrollment::EnrollmentResource;
use super::handlers::{SharedState, route_not_found};
use super::resource::{CollectionResource, ResourceDescriptor, ResourceRegistry, ResourceRoutes};
use crate::config::{AccessConfig, AppConfig, Environment};
use crate::core::auth::{AuthProvider, NoAuthProvider};
use crate::core::cache::Cache;
use crate::core::enrollment::EnrollmentService;
use crate::core::error::{ErrorDetail, ErrorResponse, status_label};
use crate::core::sort_cache::{DEFAULT_SORT_TTL_SECONDS, MAX_SORT_TTL_SECONDS, SortCache};
use crate::core::store::Collection;
use crate::storage::InMemoryCache;

/// Service name reported by the health endpoints
pub const SERVICE_NAME: &str = "campus-rs";

/// Builder for creating HTTP servers with auto-registered routes
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_cache(InMemoryCache::new())
///     .register(
///         ResourceDescriptor::new("Student", "student", "students"),
///         InMemoryCollection::new(),
///     )
///     .build()?;
/// ```
pub struct ServerBuilder {
    registry: ResourceRegistry,
    auth: Arc<dyn AuthProvider>,
    cache: Arc<dyn Cache>,
    sort_ttl: u64,
    environment: Environment,
    access: IndexMap<String, AccessConfig>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    ///
    /// Defaults: anonymous auth, in-memory cache, one hour sort TTL,
    /// production error rendering.
    pub fn new() -> Self {
        Self {
            registry: ResourceRegistry::new(),
            auth: Arc::new(NoAuthProvider),
            cache: Arc::new(InMemoryCache::new()),
            sort_ttl: DEFAULT_SORT_TTL_SECONDS,
            environment: Environment::default(),
            access: IndexMap::new(),
            custom_routes: Vec::new(),
        }
    }

    /// Seed the builder from application configuration
    ///
    /// The cache is not connected here; pass one with [`with_cache_arc`](Self::with_cache_arc)
    /// (see [`crate::storage::cache_from_config`]).
    pub fn from_config(config: &AppConfig) -> Self {
        let mut builder = Self::new()
            .with_environment(config.environment)
            .with_sort_ttl(config.cache.ttl_seconds);
        if !config.auth.tokens.is_empty() {
            builder = builder.with_auth_provider(config.auth.provider());
        }
        builder.access = config.access.clone();
        builder
    }

    /// Set the auth provider
    pub fn with_auth_provider(mut self, provider: impl AuthProvider + 'static) -> Self {
        self.auth = Arc::new(provider);
        self
    }

    /// Set the cache holding sorted views
    pub fn with_cache(self, cache: impl Cache + 'static) -> Self {
        self.with_cache_arc(Arc::new(cache))
    }

    pub fn with_cache_arc(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = cache;
        self
    }

    /// Expiry of cached sorted views, in seconds
    pub fn with_sort_ttl(mut self, ttl_seconds: u64) -> Self {
        self.sort_ttl = ttl_seconds;
        self
    }

    /// Development mode returns full error details to the caller
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Add custom routes to the server
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Register a collection under its descriptor
    pub fn register<C: Collection>(self, descriptor: ResourceDescriptor, collection: C) -> Self {
        self.register_arc(descriptor, Arc::new(collection))
    }

    /// Register a collection the caller keeps a handle to
    pub fn register_arc<C: Collection>(
        self,
        descriptor: ResourceDescriptor,
        collection: Arc<C>,
    ) -> Self {
        self.with_resource(CollectionResource::new(descriptor, collection))
    }

    /// Register the enrollment routes under `/api/enrollments`
    pub fn with_enrollments<E: Collection>(self, service: EnrollmentService<E>) -> Self {
        self.with_resource(EnrollmentResource::new(service))
    }

    /// Register any resource; a later one with the same plural replaces it
    pub fn with_resource(mut self, resource: impl ResourceRoutes + 'static) -> Self {
        self.registry.register(Box::new(resource));
        self
    }

    /// Build the final router
    ///
    /// This generates:
    /// - Health routes (`/health`, `/healthz`)
    /// - CRUD and sort routes for all registered resources
    /// - Custom routes
    /// - A fallback answering 404 for everything else
    pub fn build(mut self) -> Result<Router> {
        anyhow::ensure!(
            (1..=MAX_SORT_TTL_SECONDS).contains(&self.sort_ttl),
            "sort cache TTL must be between 1 and {} seconds, got {}",
            MAX_SORT_TTL_SECONDS,
            self.sort_ttl
        );
        self.apply_access_overrides()?;

        let shared = SharedState {
            auth: self.auth.clone(),
            sort_cache: SortCache::new(self.cache.clone()).with_ttl(self.sort_ttl),
        };

        let mut app = health_routes().merge(self.registry.build_routes(&shared));
        for custom_router in std::mem::take(&mut self.custom_routes) {
            app = app.merge(custom_router);
        }
        app = app.fallback(route_not_found);

        if self.environment.is_development() {
            app = app.layer(map_response(expose_error_detail));
        }

        tracing::debug!(
            resources = ?self.registry.plurals(),
            environment = ?self.environment,
            "router built"
        );

        Ok(app.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        ))
    }

    fn apply_access_overrides(&mut self) -> Result<()> {
        for (plural, access) in &self.access {
            let Some(resource) = self.registry.get_mut(plural) else {
                tracing::warn!(resource = %plural, "access override for unknown resource");
                continue;
            };
            let descriptor = resource.descriptor_mut();
            if let Some(policy) = access.read_policy()? {
                *descriptor = descriptor.clone().with_read_policy(policy);
            }
            if let Some(policy) = access.write_policy()? {
                *descriptor = descriptor.clone().with_write_policy(policy);
            }
        }
        Ok(())
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the provided address
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME
    }))
}

/// Replace redacted error bodies with the full detail
async fn expose_error_detail(response: Response) -> Response {
    let Some(detail) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let status = response.status();
    let body = ErrorResponse {
        status: status_label(status),
        message: detail.message,
        code: Some(detail.code.to_string()),
    };
    (status, Json(body)).into_response()
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
