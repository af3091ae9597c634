//! Cached whole-collection sorting
//!
//! Serves `GET /api/sort/{resource}?field=..&order=..`. The sorted result is
//! memoized under `{Kind}_sorted_{field}_{order}` for the configured TTL;
//! writes to the collection do not invalidate it, so a sorted view can be
//! up to one TTL stale.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::cache::Cache;
use crate::core::error::{CampusError, ValidationError};
use crate::core::query::QueryParams;
use crate::core::sort::{SortOrder, quick_sort};
use crate::core::store::{Collection, Record};

/// Default expiry of a cached sorted view
pub const DEFAULT_SORT_TTL_SECONDS: u64 = 3600;

/// Longest accepted expiry (one year)
pub const MAX_SORT_TTL_SECONDS: u64 = 365 * 24 * 3600;

/// Validated sort parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortRequest {
    pub field: String,
    pub order: SortOrder,
}

impl SortRequest {
    /// Read `field` and `order`; both are required
    pub fn from_params(params: &QueryParams) -> Result<Self, ValidationError> {
        let (Some(field), Some(order)) = (params.non_empty("field"), params.non_empty("order"))
        else {
            return Err(ValidationError::MissingSortParams);
        };

        Ok(Self {
            field,
            order: order.parse()?,
        })
    }
}

/// Sort endpoint response, also the cached payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortResponse {
    pub field: String,
    pub order: SortOrder,
    pub data: Vec<Record>,
}

/// Sort-and-cache orchestration
#[derive(Clone)]
pub struct SortCache {
    cache: Arc<dyn Cache>,
    ttl_seconds: u64,
}

impl SortCache {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            ttl_seconds: DEFAULT_SORT_TTL_SECONDS,
        }
    }

    /// Override the entry expiry
    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Deterministic key for one (kind, field, order) combination
    pub fn cache_key(kind: &str, field: &str, order: SortOrder) -> String {
        format!("{}_sorted_{}_{}", kind, field, order)
    }

    /// Serve a sorted view of `collection`, from cache when possible
    pub async fn sorted<C>(
        &self,
        kind: &str,
        collection: &C,
        request: SortRequest,
    ) -> Result<SortResponse, CampusError>
    where
        C: Collection + ?Sized,
    {
        let key = Self::cache_key(kind, &request.field, request.order);

        if let Some(cached) = self.cache.get(&key).await.map_err(CampusError::cache)? {
            match serde_json::from_str::<SortResponse>(&cached) {
                Ok(response) => {
                    tracing::info!(key = %key, "Cache hit");
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "discarding unreadable cache entry");
                }
            }
        }

        tracing::info!(key = %key, "Cache miss");

        let records = collection.find_all().await.map_err(CampusError::storage)?;
        let response = SortResponse {
            data: quick_sort(&records, &request.field, request.order),
            field: request.field,
            order: request.order,
        };

        let payload = serde_json::to_string(&response)
            .map_err(|e| CampusError::Internal(format!("failed to encode sort response: {}", e)))?;
        self.cache
            .set_ex(&key, self.ttl_seconds, payload)
            .await
            .map_err(CampusError::cache)?;

        Ok(response)
    }
}

impl std::fmt::Debug for SortCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortCache")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_format() {
        assert_eq!(
            SortCache::cache_key("Student", "gpa", SortOrder::Asc),
            "Student_sorted_gpa_asc"
        );
        assert_eq!(
            SortCache::cache_key("Course", "name", SortOrder::Desc),
            "Course_sorted_name_desc"
        );
    }

    #[test]
    fn test_request_requires_field_and_order() {
        for pairs in [
            vec![],
            vec![("field", "gpa")],
            vec![("order", "asc")],
            vec![("field", ""), ("order", "asc")],
        ] {
            assert_eq!(
                SortRequest::from_params(&QueryParams::from_pairs(pairs)),
                Err(ValidationError::MissingSortParams)
            );
        }
    }

    #[test]
    fn test_request_rejects_unknown_order() {
        let params = QueryParams::from_pairs([("field", "gpa"), ("order", "up")]);
        assert_eq!(
            SortRequest::from_params(&params),
            Err(ValidationError::InvalidSortOrder { value: "up".into() })
        );
    }

    #[test]
    fn test_request_parses() {
        let params = QueryParams::from_pairs([("field", "gpa"), ("order", "desc")]);
        assert_eq!(
            SortRequest::from_params(&params),
            Ok(SortRequest {
                field: "gpa".into(),
                order: SortOrder::Desc
            })
        );
    }
}
