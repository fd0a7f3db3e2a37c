//! Notification admission.

pub mod envelope;
pub mod health;
pub mod outcome;
pub mod request;
pub mod service;

pub use envelope::ApiEnvelope;
pub use health::{ComponentHealth, HealthReport};
pub use outcome::{DeliveryOutcome, DeliveryOutcomeSink};
pub use request::{NotificationRequest, NotificationRequestBody};
pub use service::{Admission, DispatchService, IdempotencyFailurePolicy};
