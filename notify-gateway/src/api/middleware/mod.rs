//! API middleware.

pub mod auth;

pub use auth::{API_KEY_HEADER, ApiKeyAuth, require_api_key};
