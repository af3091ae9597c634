//! Persistence collaborator traits
//!
//! A [`Collection`] hands out [`CollectionQuery`] values. A query is a
//! pending, unexecuted description of what to fetch; each refinement
//! consumes it and returns the narrowed query, and `execute` materializes
//! the records.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::filter::Filter;
use crate::core::sort::SortOrder;

/// A stored document: plain field/value pairs
pub type Record = Map<String, Value>;

/// Field holding the record identifier
pub const ID_FIELD: &str = "_id";
/// Creation timestamp field
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Last-update timestamp field
pub const UPDATED_AT_FIELD: &str = "updatedAt";
/// Internal document version field
pub const VERSION_FIELD: &str = "__v";

/// Constraint violations reported by collections
///
/// Backends return these inside `anyhow::Error`; the HTTP layer downcasts
/// them into client errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Duplicate field value: {value}. Please use another value")]
    Duplicate { field: String, value: String },

    #[error("Missing required field '{field}'")]
    MissingKey { field: String },
}

/// One key of a multi-key sort directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }

    /// Parse `name` or `-name`
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        match token.strip_prefix('-') {
            Some("") => None,
            Some(field) => Some(Self::desc(field)),
            None if token.is_empty() => None,
            None => Some(Self::asc(token)),
        }
    }
}

/// Field projection applied to query results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Keep only these fields (plus the identifier)
    Include(Vec<String>),
    /// Drop these fields
    Exclude(Vec<String>),
}

impl Projection {
    /// Apply to a single record
    pub fn apply(&self, mut record: Record) -> Record {
        match self {
            Projection::Include(fields) => {
                record.retain(|key, _| key == ID_FIELD || fields.iter().any(|f| f == key));
                record
            }
            Projection::Exclude(fields) => {
                for field in fields {
                    record.remove(field);
                }
                record
            }
        }
    }
}

/// A pending collection query
///
/// Every refinement returns a further-refined query. Repeated stages compose
/// the same way in every backend:
///
/// - `find` conjoins filters; comparisons on one field accumulate
/// - `sort` appends new keys; a key already present keeps its position and
///   takes the new direction
/// - `skip`, `limit` and `select` replace the earlier value
///
/// `skip` and `limit` take signed values: the query pipeline passes zero and
/// negative values through and each backend decides what they mean.
#[async_trait]
pub trait CollectionQuery: Send + Sized + 'static {
    /// Narrow by an additional filter (conjunction with earlier filters)
    fn find(self, filter: Filter) -> Self;

    /// Skip the first `n` matching records
    fn skip(self, n: i64) -> Self;

    /// Return at most `n` records
    fn limit(self, n: i64) -> Self;

    /// Order by the given keys, primary key first
    fn sort(self, keys: Vec<SortKey>) -> Self;

    /// Project each result, replacing any earlier projection
    fn select(self, projection: Projection) -> Self;

    /// Materialize the query
    async fn execute(self) -> Result<Vec<Record>>;
}

/// A collection of records of one kind
///
/// Implementations own their storage; nothing is shared through globals.
#[async_trait]
pub trait Collection: Send + Sync + 'static {
    type Query: CollectionQuery;

    /// Start a query with the given filter
    fn find(&self, filter: Filter) -> Self::Query;

    /// Fetch a record by its lookup key
    async fn get(&self, id: &str) -> Result<Option<Record>>;

    /// Insert a record, assigning identifier, timestamps and version
    async fn insert(&self, record: Record) -> Result<Record>;

    /// Merge `patch` into an existing record
    async fn update(&self, id: &str, patch: Record) -> Result<Option<Record>>;

    /// Delete a record, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Fetch every record, unfiltered and in storage order
    async fn find_all(&self) -> Result<Vec<Record>> {
        self.find(Filter::all()).execute().await
    }
}
