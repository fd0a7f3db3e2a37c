//! Repository layer for database access.
//!
//! Each store has a trait, an SQLx implementation, and a `*TxOps` helper for
//! writes that must share a transaction.

pub mod idempotency;
pub mod notification;

pub use idempotency::*;
pub use notification::*;
