//! Typed error handling for campus-rs
//!
//! Every handler returns `Result<_, CampusError>`. The error knows its HTTP
//! status and a stable machine-readable code, and renders itself into the
//! JSON envelope used across the API:
//!
//! ```json
//! { "status": "fail", "message": "Invalid page or limit parameter" }
//! ```
//!
//! # Error Categories
//!
//! - [`ValidationError`]: missing or malformed query parameters and bodies (400)
//! - [`QueryError`]: filters that cannot be turned into a structured query (400)
//! - [`CampusError::NotFound`]: a referenced record does not exist (404)
//! - [`RequestError`]: authentication, authorization and routing failures
//! - [`UpstreamError`]: persistence or cache collaborator failures (500)
//! - [`ConfigError`]: configuration loading failures
//!
//! Client errors (4xx) are *operational*: their message is always shown to
//! the caller. Server errors are logged and replaced by a generic message;
//! the development layer installed by the server builder puts the detail
//! back (see [`ErrorDetail`]).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Message returned for non-operational errors in production
pub const GENERIC_ERROR_MESSAGE: &str = "Something went very wrong!";

/// The main error type for campus-rs
#[derive(Debug, Error)]
pub enum CampusError {
    /// Invalid client input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Query parameters that cannot be expressed as a filter
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Referenced record does not exist
    #[error("{message}")]
    NotFound { message: String },

    /// Authentication, authorization and routing errors
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Persistence or cache failures
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CampusError {
    /// Not-found error for a single record lookup
    pub fn not_found(singular: &str) -> Self {
        CampusError::NotFound {
            message: format!("No {} found with that ID", singular),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CampusError::Validation(_) => StatusCode::BAD_REQUEST,
            CampusError::Query(_) => StatusCode::BAD_REQUEST,
            CampusError::NotFound { .. } => StatusCode::NOT_FOUND,
            CampusError::Request(e) => e.status_code(),
            CampusError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CampusError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CampusError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            CampusError::Validation(e) => e.error_code(),
            CampusError::Query(_) => "INVALID_QUERY",
            CampusError::NotFound { .. } => "NOT_FOUND",
            CampusError::Request(e) => e.error_code(),
            CampusError::Upstream(e) => e.error_code(),
            CampusError::Config(_) => "CONFIG_ERROR",
            CampusError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the message is safe to show to the caller
    pub fn is_operational(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Convert to the production error body
    pub fn to_response(&self) -> ErrorResponse {
        let message = if self.is_operational() {
            self.to_string()
        } else {
            GENERIC_ERROR_MESSAGE.to_string()
        };

        ErrorResponse {
            status: status_label(self.status_code()),
            message,
            code: None,
        }
    }
}

/// `"fail"` for client errors, `"error"` for everything else
pub fn status_label(status: StatusCode) -> &'static str {
    if status.is_client_error() {
        "fail"
    } else {
        "error"
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// `fail` or `error`
    pub status: &'static str,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code (development mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Full error detail attached to every error response as an extension
///
/// The production body never contains internal messages. The development
/// response layer reads this extension to render the unredacted error.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for CampusError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if !self.is_operational() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }

        let detail = ErrorDetail {
            code: self.error_code(),
            message: self.to_string(),
        };

        let mut response = (status, Json(self.to_response())).into_response();
        response.extensions_mut().insert(detail);
        response
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to client input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `field` or `order` missing on a sort request
    #[error("Field or order query missing")]
    MissingSortParams,

    /// `order` is neither `asc` nor `desc`
    #[error("Invalid sort order '{value}', expected 'asc' or 'desc'")]
    InvalidSortOrder { value: String },

    /// `page` or `limit` below 1
    #[error("Invalid page or limit parameter")]
    InvalidPagination,

    /// Request body is not acceptable
    #[error("Invalid input data: {message}")]
    InvalidBody { message: String },

    /// A unique field already holds this value
    #[error("Duplicate field value: {value}. Please use another value")]
    DuplicateValue { value: String },

    /// Enrollment body without a student or course reference
    #[error("Student ID and Course ID are required")]
    MissingEnrollmentRefs,

    /// The student already holds an enrollment for the course
    #[error("Student is already enrolled in this course")]
    AlreadyEnrolled,
}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::MissingSortParams => "MISSING_SORT_PARAMS",
            ValidationError::InvalidSortOrder { .. } => "INVALID_SORT_ORDER",
            ValidationError::InvalidPagination => "INVALID_PAGINATION",
            ValidationError::InvalidBody { .. } => "INVALID_BODY",
            ValidationError::DuplicateValue { .. } => "DUPLICATE_VALUE",
            ValidationError::MissingEnrollmentRefs => "MISSING_ENROLLMENT_REFS",
            ValidationError::AlreadyEnrolled => "ALREADY_ENROLLED",
        }
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors raised while turning query parameters into a filter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A nested key under a field is not a comparison operator
    #[error("Invalid filter on '{field}': unknown operator '{operator}'")]
    UnknownOperator { field: String, operator: String },

    /// A comparison operator was used without a field
    #[error("Invalid filter: operator '{operator}' must be nested under a field")]
    OperatorWithoutField { operator: String },

    /// The value shape is not supported for this position
    #[error("Invalid filter on '{field}': {message}")]
    UnsupportedValue { field: String, message: String },
}

// =============================================================================
// Request Errors
// =============================================================================

/// Authentication, authorization and routing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// No credentials supplied
    #[error("You are not logged in! Please log in to get access.")]
    Unauthenticated,

    /// Credentials supplied but not recognized
    #[error("Invalid token. Please log in again.")]
    InvalidToken,

    /// Authenticated but lacking the required role
    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// No route matches the request
    #[error("Can't find {path}")]
    RouteNotFound { path: String },
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::Unauthenticated => StatusCode::UNAUTHORIZED,
            RequestError::InvalidToken => StatusCode::UNAUTHORIZED,
            RequestError::Forbidden => StatusCode::FORBIDDEN,
            RequestError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::Unauthenticated => "UNAUTHENTICATED",
            RequestError::InvalidToken => "INVALID_TOKEN",
            RequestError::Forbidden => "FORBIDDEN",
            RequestError::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
        }
    }
}

// =============================================================================
// Upstream Errors
// =============================================================================

/// Failures reported by the persistence or cache collaborators
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Storage error: {0}")]
    Storage(anyhow::Error),

    #[error("Cache error: {0}")]
    Cache(anyhow::Error),
}

impl UpstreamError {
    pub fn error_code(&self) -> &'static str {
        match self {
            UpstreamError::Storage(_) => "STORAGE_ERROR",
            UpstreamError::Cache(_) => "CACHE_ERROR",
        }
    }
}

impl CampusError {
    /// Wrap a persistence failure
    pub fn storage(err: anyhow::Error) -> Self {
        CampusError::Upstream(UpstreamError::Storage(err))
    }

    /// Wrap a cache failure
    pub fn cache(err: anyhow::Error) -> Self {
        CampusError::Upstream(UpstreamError::Cache(err))
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors related to configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse configuration: {message}")]
    Parse { message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_request() {
        let err = CampusError::from(ValidationError::MissingSortParams);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Field or order query missing");
        assert!(err.is_operational());
    }

    #[test]
    fn test_not_found_message() {
        let err = CampusError::not_found("student");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "No student found with that ID");
    }

    #[test]
    fn test_request_error_status_codes() {
        assert_eq!(
            RequestError::Unauthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(RequestError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            RequestError::RouteNotFound {
                path: "/nope".into()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_upstream_error_is_redacted() {
        let err = CampusError::cache(anyhow::anyhow!("connection refused"));
        let body = err.to_response();
        assert_eq!(body.status, "error");
        assert_eq!(body.message, GENERIC_ERROR_MESSAGE);
        assert_eq!(err.error_code(), "CACHE_ERROR");
    }

    #[test]
    fn test_operational_error_keeps_message() {
        let err = CampusError::from(ValidationError::InvalidPagination);
        let body = err.to_response();
        assert_eq!(body.status, "fail");
        assert_eq!(body.message, "Invalid page or limit parameter");
    }

    #[test]
    fn test_into_response_attaches_detail() {
        let response = CampusError::storage(anyhow::anyhow!("disk full")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response.extensions().get::<ErrorDetail>().unwrap();
        assert_eq!(detail.code, "STORAGE_ERROR");
        assert!(detail.message.contains("disk full"));
    }
}
