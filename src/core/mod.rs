//! Core module containing the query pipeline, sorting and collaborator traits

pub mod auth;
pub mod cache;
pub mod enrollment;
pub mod error;
pub mod features;
pub mod filter;
pub mod pagination;
pub mod query;
pub mod sort;
pub mod sort_cache;
pub mod store;

pub use auth::{AccessPolicy, AuthContext, AuthProvider, NoAuthProvider, Principal, Role};
pub use cache::Cache;
pub use enrollment::{EnrollmentService, RecordLookup};
pub use error::{CampusError, ErrorResponse};
pub use features::QueryFeatures;
pub use filter::{ComparisonOperator, Condition, Filter};
pub use pagination::Pagination;
pub use query::{ParamValue, QueryParams};
pub use sort::{SortOrder, quick_sort};
pub use sort_cache::{SortCache, SortRequest, SortResponse};
pub use store::{Collection, CollectionQuery, Projection, Record, SortKey, StoreError};
