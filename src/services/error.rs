//! Error handling utilities for route handlers
//!
//! Failures surface to the caller as `{ "error": "..." }` bodies. Provider
//! and configuration errors carry their message verbatim; unexpected internal
//! errors are logged and replaced with a generic message.

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, message)
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    error_response(StatusCode::NOT_FOUND, message)
}

pub fn unauthorized() -> ApiError {
    error_response(StatusCode::UNAUTHORIZED, "Not authenticated")
}

/// Extension trait for logging errors and converting to an [`ApiError`]
pub trait LogErr<T> {
    /// Log error with context and return a generic 500 response
    fn log_500(self, context: &str) -> Result<T, ApiError>;

    /// Log error with context and return the given status with the error's text
    fn log_status(self, context: &str, status: StatusCode) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!("{}: {}", context, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        })
    }

    fn log_status(self, context: &str, status: StatusCode) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!("{}: {}", context, e);
            error_response(status, e.to_string())
        })
    }
}
