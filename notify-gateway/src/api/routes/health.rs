//! Health check route.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::dispatch::ApiEnvelope;
use crate::error::Error;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Report storage and broker reachability. Always 200.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health report in the envelope's data", body = crate::dispatch::ApiEnvelope)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<ApiEnvelope>> {
    let report = state.dispatch.health().await;
    if !report.storage.reachable || !report.broker.reachable {
        tracing::warn!(
            storage = %report.storage.detail,
            broker = %report.broker.detail,
            uptime_secs = state.start_time.elapsed().as_secs(),
            "Health check found unreachable dependency"
        );
    }

    let data = serde_json::to_value(&report).map_err(Error::from)?;
    Ok(Json(ApiEnvelope::success("health check", Some(data))))
}
