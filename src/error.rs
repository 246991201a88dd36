//! Router Error Types
//!
//! Every failure the router surfaces is one `RouterError` with a stable
//! machine-readable code and an HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Boxed error produced by a database driver
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// Router result type
pub type RouterResult<T> = Result<T, RouterError>;

/// Router error type
#[derive(Debug, Error)]
pub enum RouterError {
    /// Bad route definition, adapter-query shape mismatch or adapter selection failure
    #[error("Validation error: {0}")]
    Validation(String),

    /// Route reads the auth namespace but no resolver was configured
    #[error("Route {0} references auth but no auth resolver is configured")]
    AuthResolverMissing(String),

    /// The auth resolver ran and produced no context
    #[error("Authentication required")]
    AuthRequired,

    /// Expression calls a function outside the builtin set
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// The engine call failed
    #[error("Query failed: {message}")]
    Query {
        message: String,
        #[source]
        source: DriverError,
    },

    /// Single-item extraction found nothing
    #[error("Resource not found")]
    NotFound,
}

impl RouterError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a query error wrapping the driver failure
    pub fn query(msg: impl Into<String>, source: impl Into<DriverError>) -> Self {
        Self::Query {
            message: msg.into(),
            source: source.into(),
        }
    }

    /// Get error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::AuthResolverMissing(_) => "AUTH_RESOLVER_MISSING",
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::UnknownFunction(_) => "UNKNOWN_FUNCTION",
            Self::Query { .. } => "QUERY_ERROR",
            Self::NotFound => "NOT_FOUND",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AuthRequired => 401,
            Self::NotFound => 404,
            Self::Validation(_)
            | Self::AuthResolverMissing(_)
            | Self::UnknownFunction(_)
            | Self::Query { .. } => 500,
        }
    }

    /// Diagnostic detail (the engine error for query failures)
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Query { source, .. } => Some(source.to_string()),
            _ => None,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub error: String,
    pub status: u16,
}

impl From<&RouterError> for ErrorResponse {
    fn from(err: &RouterError) -> Self {
        Self {
            code: err.code(),
            error: err.to_string(),
            status: err.status_code(),
        }
    }
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_status_codes() {
        assert_eq!(RouterError::AuthRequired.status_code(), 401);
        assert_eq!(RouterError::NotFound.status_code(), 404);
        assert_eq!(RouterError::validation("bad").status_code(), 500);
        assert_eq!(
            RouterError::AuthResolverMissing("GET /me".into()).status_code(),
            500
        );
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(RouterError::validation("x").code(), "VALIDATION_ERROR");
        assert_eq!(RouterError::UnknownFunction("f".into()).code(), "UNKNOWN_FUNCTION");
        assert_eq!(RouterError::query("boom", "driver down").code(), "QUERY_ERROR");
    }

    #[test]
    fn test_query_error_keeps_source() {
        let err = RouterError::query("select failed", "connection reset");
        assert_eq!(err.detail().as_deref(), Some("connection reset"));
        assert_eq!(err.source().map(|e| e.to_string()).as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_error_response_body() {
        let body = ErrorResponse::from(&RouterError::NotFound);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["status"], 404);
        assert_eq!(json["error"], "Resource not found");
    }
}
