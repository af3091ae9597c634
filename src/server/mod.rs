//! Server module for building HTTP servers with auto-registered routes
//!
//! This module provides a `ServerBuilder` that registers, for every resource:
//! - CRUD routes under `/api/{plural}`
//! - A cached sorted view under `/api/sort/{plural}`
//!
//! plus health routes, the enrollment routes and a 404 fallback.

pub mod builder;
pub mod enrollment;
pub mod handlers;
pub mod resource;

pub use builder::{SERVICE_NAME, ServerBuilder};
pub use enrollment::EnrollmentResource;
pub use handlers::{DataResponse, ListResponse, SharedState};
pub use resource::{ListingMode, ResourceDescriptor, ResourceRegistry, ResourceRoutes};
