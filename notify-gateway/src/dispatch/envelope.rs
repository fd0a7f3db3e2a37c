//! Uniform response envelope.
//!
//! Every HTTP response body, success or failure, has the shape
//! `{success, message, data, error, meta}`. Admission responses are rendered
//! once and stored as text so a duplicate request receives the same bytes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::Result;
use crate::database::models::StoredResponse;

pub const QUEUED_MESSAGE: &str = "Notification queued";
pub const PUBLISH_FAILED_MESSAGE: &str = "Failed to publish to message queue";

/// Status reported in the `data` of an admitted request.
pub const QUEUED_STATUS: &str = "queued";

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApiEnvelope {
    pub success: bool,
    pub message: String,
    #[schema(value_type = Option<Object>)]
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[schema(value_type = Object)]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

/// `data` of a queued admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QueuedData {
    pub request_id: String,
    pub status: String,
}

impl ApiEnvelope {
    pub fn success(message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error: None,
            meta: serde_json::Map::new(),
        }
    }

    pub fn failure(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error,
            meta: serde_json::Map::new(),
        }
    }

    /// The response for an admitted request. Used both as the placeholder
    /// reserved before publish and as the final response after it.
    pub fn queued(request_id: &str) -> Self {
        Self::success(
            QUEUED_MESSAGE,
            Some(serde_json::json!({
                "request_id": request_id,
                "status": QUEUED_STATUS,
            })),
        )
    }

    /// The response for a publish that failed or was rejected by the breaker.
    pub fn publish_failed(reason: &str) -> Self {
        Self::failure(PUBLISH_FAILED_MESSAGE, Some(reason.to_string()))
    }

    pub fn to_stored(&self) -> Result<StoredResponse> {
        Ok(StoredResponse::new(serde_json::to_string(self)?))
    }
}
