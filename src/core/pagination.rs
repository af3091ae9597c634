//! Strict pagination
//!
//! Alternative to [`QueryFeatures::paginate`](crate::core::features::QueryFeatures::paginate)
//! for listings that must reject out-of-range pages instead of passing them
//! to the backend. The two are never combined on one request.

use serde::Serialize;

use crate::core::error::ValidationError;
use crate::core::features::{DEFAULT_LIMIT, DEFAULT_PAGE};
use crate::core::query::{QueryParams, parse_int};
use crate::core::store::CollectionQuery;

/// Validated skip/limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub skip: i64,
    pub limit: i64,
}

impl Pagination {
    /// Parse `page`/`limit` (defaults 1/100), rejecting values below 1
    pub fn from_params(params: &QueryParams) -> Result<Self, ValidationError> {
        let page = parse_int(params.text("page")).unwrap_or(DEFAULT_PAGE);
        let limit = parse_int(params.text("limit")).unwrap_or(DEFAULT_LIMIT);

        if page < 1 || limit < 1 {
            return Err(ValidationError::InvalidPagination);
        }

        Ok(Self {
            skip: (page - 1).saturating_mul(limit),
            limit,
        })
    }

    /// Apply the window to a query
    pub fn apply<Q: CollectionQuery>(&self, query: Q) -> Q {
        query.skip(self.skip).limit(self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let pagination = Pagination::from_params(&QueryParams::new()).unwrap();
        assert_eq!(pagination, Pagination { skip: 0, limit: 100 });
    }

    #[test]
    fn test_skip_is_computed() {
        let params = QueryParams::from_pairs([("page", "2"), ("limit", "10")]);
        let pagination = Pagination::from_params(&params).unwrap();
        assert_eq!(pagination, Pagination { skip: 10, limit: 10 });
    }

    #[test]
    fn test_rejects_non_positive() {
        for (page, limit) in [("0", "10"), ("1", "0"), ("-1", "10"), ("2", "-4")] {
            let params = QueryParams::from_pairs([("page", page), ("limit", limit)]);
            assert_eq!(
                Pagination::from_params(&params),
                Err(ValidationError::InvalidPagination),
                "page={page} limit={limit}"
            );
        }
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            ValidationError::InvalidPagination.to_string(),
            "Invalid page or limit parameter"
        );
    }
}
