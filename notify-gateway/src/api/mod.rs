//! HTTP API.
//!
//! - `POST /notifications`: admission, guarded by the `x-api-key` header
//! - `GET /health`: storage and broker reachability
//! - `GET /api-docs/openapi.json`: OpenAPI document

pub mod error;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState};
