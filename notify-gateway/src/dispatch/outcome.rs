//! Delivery outcome reporting.
//!
//! Downstream consumers know whether a notification was actually delivered;
//! the gateway only knows it was queued. [`DeliveryOutcomeSink`] is the hook
//! through which such a report moves a record out of `pending`.

use async_trait::async_trait;

use crate::Result;
use crate::database::models::NotificationStatus;

/// Result of a delivery attempt, as seen by a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Retrying,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn status(&self) -> NotificationStatus {
        match self {
            Self::Sent => NotificationStatus::Sent,
            Self::Retrying => NotificationStatus::Retrying,
            Self::Failed(_) => NotificationStatus::Failed,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

#[async_trait]
pub trait DeliveryOutcomeSink: Send + Sync {
    /// Apply `outcome` to the record for `request_id`.
    ///
    /// Fails with `NotFound` for an unknown id and `InvalidStateTransition`
    /// when the record is already terminal.
    async fn report_outcome(&self, request_id: &str, outcome: DeliveryOutcome) -> Result<()>;
}
