//! notify-gateway library crate.
//!
//! Idempotent notification admission: requests are deduplicated, recorded in
//! SQLite and published to an AMQP exchange behind a shared circuit breaker.

pub mod api;
pub mod broker;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
