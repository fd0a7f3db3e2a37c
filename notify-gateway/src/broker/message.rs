//! Outbound message format and routing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::database::models::NotificationKind;

/// Header carrying the notification kind on every published message.
pub const NOTIFICATION_TYPE_HEADER: &str = "notification_type";

/// Message metadata headers.
pub type MessageHeaders = BTreeMap<String, String>;

/// JSON body published to the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub request_id: String,
    pub to: String,
    pub notification_type: NotificationKind,
    pub template_id: Option<String>,
    pub payload: serde_json::Map<String, serde_json::Value>,
    /// RFC 3339 UTC timestamp of admission
    pub created_at: String,
}

impl OutboundMessage {
    /// Headers attached to this message.
    pub fn headers(&self) -> MessageHeaders {
        let mut headers = MessageHeaders::new();
        headers.insert(
            NOTIFICATION_TYPE_HEADER.to_string(),
            self.notification_type.as_str().to_string(),
        );
        headers
    }
}

pub const DEFAULT_EMAIL_ROUTING_KEY: &str = "notifications.email";
pub const DEFAULT_PUSH_ROUTING_KEY: &str = "notifications.push";
pub const DEFAULT_UPDATE_ROUTING_KEY: &str = "notifications.update";

/// Routing key per notification kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    pub email: String,
    pub push: String,
    pub update: String,
}

impl RoutingTable {
    pub fn routing_key(&self, kind: NotificationKind) -> &str {
        match kind {
            NotificationKind::Email => &self.email,
            NotificationKind::Push => &self.push,
            NotificationKind::Update => &self.update,
        }
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            email: DEFAULT_EMAIL_ROUTING_KEY.to_string(),
            push: DEFAULT_PUSH_ROUTING_KEY.to_string(),
            update: DEFAULT_UPDATE_ROUTING_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_keys_are_distinct() {
        let table = RoutingTable::default();
        assert_eq!(
            table.routing_key(NotificationKind::Email),
            "notifications.email"
        );
        assert_eq!(
            table.routing_key(NotificationKind::Push),
            "notifications.push"
        );
        assert_eq!(
            table.routing_key(NotificationKind::Update),
            "notifications.update"
        );
    }

    #[test]
    fn test_message_wire_format() {
        let message = OutboundMessage {
            request_id: "req-1".to_string(),
            to: "a@b.com".to_string(),
            notification_type: NotificationKind::Email,
            template_id: None,
            payload: serde_json::Map::new(),
            created_at: "2025-01-01T00:00:00.000000Z".to_string(),
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "request_id": "req-1",
                "to": "a@b.com",
                "notification_type": "email",
                "template_id": null,
                "payload": {},
                "created_at": "2025-01-01T00:00:00.000000Z",
            })
        );
        assert_eq!(
            message.headers().get(NOTIFICATION_TYPE_HEADER).map(String::as_str),
            Some("email")
        );
    }
}
