//! Message broker producer side.
//!
//! - [`Publisher`]: the seam the dispatch service publishes through
//! - [`AmqpPublisher`]: lapin implementation against a durable direct exchange
//! - [`CircuitBreaker`]: process-wide guard shared by every admission

pub mod amqp;
pub mod circuit_breaker;
pub mod message;
pub mod publisher;

pub use amqp::{AmqpConfig, AmqpPublisher};
pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitState};
pub use message::{MessageHeaders, NOTIFICATION_TYPE_HEADER, OutboundMessage, RoutingTable};
pub use publisher::{PublishError, Publisher};
