//! Admission request parsing and validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::broker::OutboundMessage;
use crate::database::models::{NotificationKind, NotificationRecordDbModel};
use crate::database::time::ms_to_datetime;
use crate::{Error, Result};

pub const INVALID_JSON: &str = "invalid_json";
pub const INVALID_REQUEST_ID: &str = "invalid_request_id";
pub const INVALID_NOTIFICATION_TYPE: &str = "invalid_notification_type";
pub const MISSING_RECIPIENT: &str = "missing_recipient";
pub const INVALID_TEMPLATE_ID: &str = "invalid_template_id";
pub const INVALID_PAYLOAD: &str = "invalid_payload";

/// Wire shape of `POST /notifications`, as documented in the OpenAPI schema.
///
/// Parsing goes through [`NotificationRequest::from_json`] so every
/// validation failure maps to its own error code.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationRequestBody {
    /// Deduplication key; generated when absent or empty
    pub request_id: Option<String>,
    pub notification_type: NotificationKind,
    /// Email address, push token or user id
    pub to: String,
    pub template_id: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub payload: Option<Map<String, Value>>,
}

/// A validated admission request.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub request_id: String,
    pub kind: NotificationKind,
    pub recipient: String,
    pub template_id: Option<String>,
    pub payload: Map<String, Value>,
}

impl NotificationRequest {
    /// Parse a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::validation(INVALID_JSON, format!("Malformed JSON body: {e}")))?;
        Self::from_json(value)
    }

    /// Validate a decoded JSON body.
    pub fn from_json(value: Value) -> Result<Self> {
        let mut body = match value {
            Value::Object(map) if !map.is_empty() => map,
            _ => {
                return Err(Error::validation(
                    INVALID_JSON,
                    "Request body must be a non-empty JSON object",
                ));
            }
        };

        let request_id = match body.remove("request_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) if id.is_empty() => None,
            Some(Value::String(id)) => Some(id),
            Some(_) => {
                return Err(Error::validation(
                    INVALID_REQUEST_ID,
                    "request_id must be a string",
                ));
            }
        }
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let kind = body
            .get("notification_type")
            .and_then(Value::as_str)
            .and_then(NotificationKind::parse)
            .ok_or_else(|| {
                Error::validation(
                    INVALID_NOTIFICATION_TYPE,
                    "notification_type must be one of: email, push, update",
                )
            })?;

        let recipient = match body.remove("to") {
            Some(Value::String(to)) if !to.trim().is_empty() => to,
            _ => return Err(Error::validation(MISSING_RECIPIENT, "Missing recipient 'to'")),
        };

        let template_id = match body.remove("template_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id),
            Some(_) => {
                return Err(Error::validation(
                    INVALID_TEMPLATE_ID,
                    "template_id must be a string",
                ));
            }
        };

        let payload = match body.remove("payload") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(Error::validation(
                    INVALID_PAYLOAD,
                    "payload must be a JSON object",
                ));
            }
        };

        Ok(Self {
            request_id,
            kind,
            recipient,
            template_id,
            payload,
        })
    }

    /// The `pending` record for this request.
    pub fn to_record(&self) -> Result<NotificationRecordDbModel> {
        Ok(NotificationRecordDbModel::new(
            self.request_id.clone(),
            self.recipient.clone(),
            self.kind,
            self.template_id.clone(),
            serde_json::to_string(&self.payload)?,
        ))
    }

    /// The broker message for this request, stamped with the record's creation time.
    pub fn to_message(&self, created_at_ms: i64) -> OutboundMessage {
        OutboundMessage {
            request_id: self.request_id.clone(),
            to: self.recipient.clone(),
            notification_type: self.kind,
            template_id: self.template_id.clone(),
            payload: self.payload.clone(),
            created_at: ms_to_datetime(created_at_ms)
                .format("%Y-%m-%dT%H:%M:%S%.6fZ")
                .to_string(),
        }
    }
}
