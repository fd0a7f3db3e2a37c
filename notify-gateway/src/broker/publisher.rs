//! Publisher abstraction over the message broker.

use async_trait::async_trait;

use super::message::{MessageHeaders, OutboundMessage};

/// Errors raised while handing a message to the broker.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to connect to broker: {0}")]
    Connect(String),

    #[error("Broker protocol error: {0}")]
    Protocol(String),

    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Broker rejected the message")]
    Rejected,

    #[error("Broker operation timed out after {0}ms")]
    Timeout(u64),
}

/// Producer side of the broker.
///
/// Implementations serialize the message, mark it persistent, attach the
/// correlation id and headers, and send it to their configured exchange.
/// They never retry on their own.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        routing_key: &str,
        message: &OutboundMessage,
        correlation_id: &str,
        headers: &MessageHeaders,
    ) -> Result<(), PublishError>;

    /// Open a fresh connection, declare the exchange, and release it.
    /// Does not touch the connection used by `publish`.
    async fn probe(&self) -> Result<(), PublishError>;

    /// Release the shared connection, if any.
    async fn close(&self) {}
}
