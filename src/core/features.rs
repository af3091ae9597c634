//! Declarative query pipeline
//!
//! [`QueryFeatures`] turns a flat parameter mapping into a staged
//! collection query:
//!
//! ```rust,ignore
//! let records = QueryFeatures::new(students.find(Filter::all()), params)
//!     .filter()?
//!     .sort()
//!     .limit_fields()
//!     .paginate()
//!     .into_query()
//!     .execute()
//!     .await?;
//! ```
//!
//! Stages compose: calling one again after a later stage narrows the query
//! further instead of resetting it.

use crate::core::error::QueryError;
use crate::core::filter::Filter;
use crate::core::query::{QueryParams, parse_int};
use crate::core::store::{CREATED_AT_FIELD, CollectionQuery, Projection, SortKey, VERSION_FIELD};

/// Page used when `page` is absent or not a number
pub const DEFAULT_PAGE: i64 = 1;
/// Page size used when `limit` is absent or not a number
pub const DEFAULT_LIMIT: i64 = 100;

/// Split a comma list, dropping empty entries
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fluent builder over a pending collection query
#[derive(Debug)]
pub struct QueryFeatures<Q> {
    query: Q,
    params: QueryParams,
}

impl<Q: CollectionQuery> QueryFeatures<Q> {
    /// Wrap an unexecuted query; performs no I/O
    pub fn new(query: Q, params: QueryParams) -> Self {
        Self { query, params }
    }

    /// Apply every non-reserved parameter as a filter clause
    pub fn filter(mut self) -> Result<Self, QueryError> {
        let filter = Filter::from_params(&self.params.without_reserved())?;
        tracing::debug!(filter = %filter.to_document(), "applying filter stage");
        self.query = self.query.find(filter);
        Ok(self)
    }

    /// Apply `sort=a,-b`, defaulting to newest first
    pub fn sort(mut self) -> Self {
        let keys = self.sort_keys();
        self.query = self.query.sort(keys);
        self
    }

    /// Apply `fields=a,b`, defaulting to hiding the version field
    pub fn limit_fields(mut self) -> Self {
        let projection = self.projection();
        self.query = self.query.select(projection);
        self
    }

    /// Apply `page`/`limit` without validating their range
    pub fn paginate(mut self) -> Self {
        let (skip, limit) = self.page_window();
        self.query = self.query.skip(skip).limit(limit);
        self
    }

    /// The parameter snapshot
    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// The query as prepared so far
    pub fn query(&self) -> &Q {
        &self.query
    }

    /// Hand the prepared query to the caller for execution
    pub fn into_query(self) -> Q {
        self.query
    }

    fn sort_keys(&self) -> Vec<SortKey> {
        let keys: Vec<SortKey> = self
            .params
            .text("sort")
            .map(|s| s.split(',').filter_map(SortKey::parse).collect())
            .unwrap_or_default();

        if keys.is_empty() {
            vec![SortKey::desc(CREATED_AT_FIELD)]
        } else {
            keys
        }
    }

    fn projection(&self) -> Projection {
        match self.params.text("fields").map(|s| split_list(&s)) {
            Some(fields) if !fields.is_empty() => Projection::Include(fields),
            _ => Projection::Exclude(vec![VERSION_FIELD.to_string()]),
        }
    }

    fn page_window(&self) -> (i64, i64) {
        let page = parse_int(self.params.text("page")).unwrap_or(DEFAULT_PAGE);
        let limit = parse_int(self.params.text("limit")).unwrap_or(DEFAULT_LIMIT);
        (page.saturating_sub(1).saturating_mul(limit), limit)
    }
}
