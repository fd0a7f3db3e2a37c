//! Database models for notify-gateway.
//!
//! These models map directly to the database schema.

pub mod idempotency;
pub mod notification;

pub use idempotency::*;
pub use notification::*;
