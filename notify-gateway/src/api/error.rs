//! API error handling.
//!
//! Failures render the same envelope as successes, with `success: false`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::dispatch::ApiEnvelope;
use crate::error::Error;

/// Machine-readable reason for a storage failure.
pub const STORAGE_ERROR: &str = "storage_error";
pub const INVALID_API_KEY: &str = "invalid_api_key";

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Value of the envelope's `error` field
    pub error: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error,
        }
    }

    pub fn bad_request(message: impl Into<String>, code: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, Some(code.to_string()))
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            Some(INVALID_API_KEY.to_string()),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            message,
            Some("not_found".to_string()),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            Some(STORAGE_ERROR.to_string()),
        )
    }

    pub fn envelope(&self) -> ApiEnvelope {
        ApiEnvelope::failure(self.message.clone(), self.error.clone())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.envelope();
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation { code, message } => ApiError::bad_request(message, code),
            Error::Publish(_) | Error::CircuitOpen => {
                // Same body the dispatch service records under the failure-recording policy.
                let envelope = ApiEnvelope::publish_failed(&err.to_string());
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    envelope.message,
                    envelope.error,
                )
            }
            Error::NotFound { entity_type, id } => {
                ApiError::not_found(format!("{} with id '{}' not found", entity_type, id))
            }
            Error::DatabaseSqlx(e) => {
                tracing::error!("Database error: {}", e);
                ApiError::internal("DB error")
            }
            _ => {
                tracing::error!("Unexpected error: {}", err);
                ApiError::internal("An unexpected error occurred")
            }
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
