//! Idempotency key database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Idempotency key database model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IdempotencyKeyDbModel {
    pub id: i64,
    pub request_id: String,
    /// Serialized response body
    pub response_payload: String,
    /// Unix epoch milliseconds
    pub created_at: i64,
}

/// A response body kept verbatim so a duplicate request gets the exact same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse(String);

impl StoredResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self(body.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<IdempotencyKeyDbModel> for StoredResponse {
    fn from(model: IdempotencyKeyDbModel) -> Self {
        Self(model.response_payload)
    }
}
