//! HTTP handlers for resource CRUD, listing and sorted views

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::Value;

use super::resource::{ListingMode, ResourceDescriptor};
use crate::core::auth::{AccessPolicy, AuthContext, AuthProvider};
use crate::core::error::{CampusError, RequestError, ValidationError};
use crate::core::features::QueryFeatures;
use crate::core::filter::Filter;
use crate::core::pagination::Pagination;
use crate::core::query::QueryParams;
use crate::core::sort_cache::{SortCache, SortRequest, SortResponse};
use crate::core::store::{Collection, CollectionQuery, Record, StoreError};

/// State shared by every resource router
#[derive(Clone)]
pub struct SharedState {
    pub auth: Arc<dyn AuthProvider>,
    pub sort_cache: SortCache,
}

/// Per-resource handler state
pub struct ResourceState<C> {
    descriptor: Arc<ResourceDescriptor>,
    collection: Arc<C>,
    shared: SharedState,
}

impl<C> ResourceState<C> {
    pub fn new(descriptor: Arc<ResourceDescriptor>, collection: Arc<C>, shared: SharedState) -> Self {
        Self {
            descriptor,
            collection,
            shared,
        }
    }

    async fn guard(
        &self,
        headers: &HeaderMap,
        policy: &AccessPolicy,
    ) -> Result<AuthContext, CampusError> {
        guard(self.shared.auth.as_ref(), headers, policy).await
    }
}

/// Resolve the caller and check it against `policy`
///
/// Public routes never consult the provider.
pub(crate) async fn guard(
    auth: &dyn AuthProvider,
    headers: &HeaderMap,
    policy: &AccessPolicy,
) -> Result<AuthContext, CampusError> {
    if *policy == AccessPolicy::Public {
        return Ok(AuthContext::Anonymous);
    }
    let context = auth.authenticate(headers).await?;
    policy.check(&context)?;
    if let Some(principal) = context.principal() {
        tracing::debug!(user_id = %principal.user_id, "request authorized");
    }
    Ok(context)
}

impl<C> Clone for ResourceState<C> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            collection: self.collection.clone(),
            shared: self.shared.clone(),
        }
    }
}

/// `{status, results, data}` listing envelope
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub status: &'static str,
    pub results: usize,
    pub data: Vec<Record>,
}

/// `{status, data}` single-record envelope
#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub status: &'static str,
    pub data: Record,
}

impl DataResponse {
    pub(crate) fn success(data: Record) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

/// Translate a collection failure, surfacing constraint violations as 400s
fn store_error(err: anyhow::Error) -> CampusError {
    match err.downcast_ref::<StoreError>() {
        Some(StoreError::Duplicate { value, .. }) => ValidationError::DuplicateValue {
            value: value.clone(),
        }
        .into(),
        Some(StoreError::MissingKey { field }) => ValidationError::InvalidBody {
            message: format!("missing required field '{}'", field),
        }
        .into(),
        None => CampusError::storage(err),
    }
}

pub(crate) fn parse_record(body: &[u8]) -> Result<Record, CampusError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(ValidationError::InvalidBody {
            message: "expected a JSON object".into(),
        }
        .into()),
        Err(e) => Err(ValidationError::InvalidBody {
            message: e.to_string(),
        }
        .into()),
    }
}

/// GET /api/{plural}
pub async fn list_resources<C: Collection>(
    State(state): State<ResourceState<C>>,
    headers: HeaderMap,
    params: QueryParams,
) -> Result<Json<ListResponse>, CampusError> {
    state.guard(&headers, state.descriptor.read_policy()).await?;

    let query = state.collection.find(Filter::all());
    let query = match state.descriptor.listing() {
        ListingMode::Features => QueryFeatures::new(query, params)
            .filter()?
            .sort()
            .limit_fields()
            .paginate()
            .into_query(),
        ListingMode::Paginated => Pagination::from_params(&params)?.apply(query),
    };

    let data = query.execute().await.map_err(store_error)?;
    tracing::debug!(
        resource = state.descriptor.plural(),
        results = data.len(),
        "listed records"
    );

    Ok(Json(ListResponse {
        status: "success",
        results: data.len(),
        data,
    }))
}

/// GET /api/{plural}/{id}
pub async fn get_resource<C: Collection>(
    State(state): State<ResourceState<C>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DataResponse>, CampusError> {
    state.guard(&headers, state.descriptor.read_policy()).await?;

    let record = state
        .collection
        .get(&id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| CampusError::not_found(state.descriptor.singular()))?;

    Ok(Json(DataResponse::success(record)))
}

/// POST /api/{plural}
pub async fn create_resource<C: Collection>(
    State(state): State<ResourceState<C>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, CampusError> {
    state.guard(&headers, state.descriptor.write_policy()).await?;

    let record = parse_record(&body)?;
    let created = state.collection.insert(record).await.map_err(store_error)?;
    tracing::info!(resource = state.descriptor.plural(), "record created");

    Ok((StatusCode::CREATED, Json(DataResponse::success(created))))
}

/// PATCH /api/{plural}/{id}
pub async fn update_resource<C: Collection>(
    State(state): State<ResourceState<C>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<DataResponse>, CampusError> {
    state.guard(&headers, state.descriptor.write_policy()).await?;

    let patch = parse_record(&body)?;
    let updated = state
        .collection
        .update(&id, patch)
        .await
        .map_err(store_error)?
        .ok_or_else(|| CampusError::not_found(state.descriptor.singular()))?;

    Ok(Json(DataResponse::success(updated)))
}

/// DELETE /api/{plural}/{id}
pub async fn delete_resource<C: Collection>(
    State(state): State<ResourceState<C>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, CampusError> {
    state.guard(&headers, state.descriptor.write_policy()).await?;

    if !state.collection.delete(&id).await.map_err(store_error)? {
        return Err(CampusError::not_found(state.descriptor.singular()));
    }
    tracing::info!(resource = state.descriptor.plural(), id = %id, "record deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sort/{plural}?field=..&order=..
pub async fn sort_resources<C: Collection>(
    State(state): State<ResourceState<C>>,
    headers: HeaderMap,
    params: QueryParams,
) -> Result<Json<SortResponse>, CampusError> {
    state.guard(&headers, state.descriptor.read_policy()).await?;

    let request = SortRequest::from_params(&params)?;
    let response = state
        .shared
        .sort_cache
        .sorted(state.descriptor.kind(), state.collection.as_ref(), request)
        .await?;

    Ok(Json(response))
}

/// Catch-all for unmatched routes
pub async fn route_not_found(uri: Uri) -> CampusError {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    RequestError::RouteNotFound { path }.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let err = store_error(
            StoreError::Duplicate {
                field: "code".into(),
                value: "CS101".into(),
            }
            .into(),
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Duplicate field value: CS101. Please use another value"
        );

        let err = store_error(anyhow::anyhow!("connection reset"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_parse_record_requires_object() {
        assert!(parse_record(br#"{"name": "Ada"}"#).is_ok());
        assert_eq!(
            parse_record(b"[1, 2]").unwrap_err().status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            parse_record(b"not json").unwrap_err().status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
