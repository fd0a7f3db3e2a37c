//! Notification record database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::now_ms;

/// Notification record database model.
/// One row per admitted request; rows are never deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationRecordDbModel {
    pub id: String,
    /// Caller-supplied deduplication key (unique)
    pub request_id: String,
    /// Email address, push token or user id
    pub recipient: String,
    /// Kind: email, push, update
    pub kind: String,
    pub template_id: Option<String>,
    /// JSON object supplied by the caller
    pub payload: String,
    /// Status: pending, sent, retrying, failed
    pub status: String,
    /// Set only while status is failed
    pub error_message: Option<String>,
    /// Unix epoch milliseconds
    pub created_at: i64,
    /// Unix epoch milliseconds, refreshed on every mutation
    pub updated_at: i64,
}

impl NotificationRecordDbModel {
    /// Build a new `pending` record.
    pub fn new(
        request_id: impl Into<String>,
        recipient: impl Into<String>,
        kind: NotificationKind,
        template_id: Option<String>,
        payload: impl Into<String>,
    ) -> Self {
        let now = now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: request_id.into(),
            recipient: recipient.into(),
            kind: kind.as_str().to_string(),
            template_id,
            payload: payload.into(),
            status: NotificationStatus::Pending.as_str().to_string(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> Option<NotificationStatus> {
        NotificationStatus::parse(&self.status)
    }

    pub fn kind(&self) -> Option<NotificationKind> {
        NotificationKind::parse(&self.kind)
    }
}

/// Notification kinds accepted by the gateway. Each kind has its own routing key.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    utoipa::ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Email,
    Push,
    Update,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::Update => "update",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Self::Email),
            "push" => Some(Self::Push),
            "update" => Some(Self::Update),
            _ => None,
        }
    }
}

/// Notification record status values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    /// Admitted; published or awaiting publish.
    Pending,
    /// Delivered, as reported by a downstream consumer.
    Sent,
    /// A downstream consumer is retrying delivery.
    Retrying,
    /// Publish or delivery failed.
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Retrying => "retrying",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "retrying" => Some(Self::Retrying),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// `sent` and `failed` accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }

    /// Transitions accepted from delivery outcome reports.
    ///
    /// The admission path writes `pending -> pending` and `pending -> failed`
    /// directly through the record store and does not consult this table.
    pub fn can_transition_to(&self, next: NotificationStatus) -> bool {
        match self {
            Self::Pending | Self::Retrying => {
                matches!(next, Self::Sent | Self::Retrying | Self::Failed)
            }
            Self::Sent | Self::Failed => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_kind_parse() {
        assert_eq!(NotificationKind::parse("email"), Some(NotificationKind::Email));
        assert_eq!(NotificationKind::parse("push"), Some(NotificationKind::Push));
        assert_eq!(NotificationKind::parse("update"), Some(NotificationKind::Update));
        assert_eq!(NotificationKind::parse("sms"), None);
        assert_eq!(NotificationKind::parse("Email"), None);
    }

    #[test]
    fn test_kind_strum_matches_as_str() {
        for kind in [
            NotificationKind::Email,
            NotificationKind::Push,
            NotificationKind::Update,
        ] {
            assert_eq!(kind.to_string(), kind.as_str());
            assert_eq!(NotificationKind::from_str(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = NotificationRecordDbModel::new(
            "req-1",
            "a@b.com",
            NotificationKind::Email,
            None,
            "{}",
        );
        assert_eq!(record.status(), Some(NotificationStatus::Pending));
        assert_eq!(record.kind(), Some(NotificationKind::Email));
        assert!(record.error_message.is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_outcome_transitions() {
        use NotificationStatus::*;

        assert!(Pending.can_transition_to(Sent));
        assert!(Pending.can_transition_to(Retrying));
        assert!(Retrying.can_transition_to(Retrying));
        assert!(Retrying.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Sent.can_transition_to(Retrying));
        assert!(!Failed.can_transition_to(Sent));
        assert!(Sent.is_terminal());
        assert!(!Retrying.is_terminal());
    }
}
