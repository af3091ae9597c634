//! # campus-rs
//!
//! REST services for a university record system: students, courses and
//! instructors, with a declarative query pipeline and cached sorted views.
//!
//! ## Features
//!
//! - **Query pipeline**: filtering (`price[gte]=5`), multi-key sorting
//!   (`sort=-price,name`), field selection and pagination from the query string
//! - **Strict pagination** for endpoints that reject bad `page`/`limit`
//! - **Sorted views**: whole-collection quicksort, memoized in a TTL cache
//!   (in-memory or Redis)
//! - **Role-based access** per resource through pluggable auth providers
//! - **Pluggable storage**: in-memory collections, MongoDB behind a feature flag
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use campus::prelude::*;
//!
//! let app = ServerBuilder::new()
//!     .register(
//!         ResourceDescriptor::new("Student", "student", "students"),
//!         InMemoryCollection::new(),
//!     )
//!     .register(
//!         ResourceDescriptor::new("Instructor", "instructor", "instructors")
//!             .with_listing(ListingMode::Paginated),
//!         InMemoryCollection::new(),
//!     )
//!     .build()?;
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod storage;
pub mod telemetry;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        auth::{AccessPolicy, AuthContext, AuthProvider, NoAuthProvider, Principal, Role},
        cache::Cache,
        enrollment::EnrollmentService,
        error::{CampusError, ValidationError},
        features::QueryFeatures,
        filter::Filter,
        pagination::Pagination,
        query::QueryParams,
        sort::{SortOrder, quick_sort},
        sort_cache::{SortCache, SortRequest, SortResponse},
        store::{Collection, CollectionQuery, Record},
    };

    // === Storage ===
    pub use crate::storage::{InMemoryCache, InMemoryCollection};
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoCollection;
    #[cfg(feature = "redis")]
    pub use crate::storage::RedisCache;

    // === Config ===
    pub use crate::config::{AppConfig, Environment};

    // === Server ===
    pub use crate::server::{ListingMode, ResourceDescriptor, ServerBuilder};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
}
