//! API key authentication middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared-secret authenticator for the `x-api-key` header.
#[derive(Clone)]
pub struct ApiKeyAuth {
    api_key: Arc<str>,
}

impl ApiKeyAuth {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Arc::from(api_key.into()),
        }
    }

    /// Compare without short-circuiting on the first mismatched byte.
    pub fn is_valid(&self, key: &str) -> bool {
        let expected = self.api_key.as_bytes();
        let given = key.as_bytes();
        if expected.len() != given.len() {
            return false;
        }
        expected
            .iter()
            .zip(given)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth").finish_non_exhaustive()
    }
}

/// Reject requests without a matching `x-api-key` header.
pub async fn require_api_key(
    State(auth): State<ApiKeyAuth>,
    request: Request,
    next: Next,
) -> Response {
    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match api_key {
        Some(key) if auth.is_valid(key) => next.run(request).await,
        Some(_) => {
            tracing::warn!("Invalid API key provided");
            ApiError::unauthorized().into_response()
        }
        None => {
            tracing::warn!("Missing API key in request");
            ApiError::unauthorized().into_response()
        }
    }
}
