//! Notification admission route.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::header,
    middleware,
    response::{IntoResponse, Response},
    routing::post,
};

use crate::api::error::ApiResult;
use crate::api::middleware::{ApiKeyAuth, require_api_key};
use crate::api::server::AppState;
use crate::database::models::StoredResponse;
use crate::dispatch::NotificationRequest;

/// Create the notifications router. Every route here requires the API key.
pub fn router(auth: ApiKeyAuth) -> Router<AppState> {
    Router::new()
        .route("/notifications", post(create_notification))
        .route_layer(middleware::from_fn_with_state(auth, require_api_key))
}

/// Admit a notification for asynchronous delivery.
///
/// Replaying a `request_id` returns the stored response unchanged.
#[utoipa::path(
    post,
    path = "/notifications",
    tag = "notifications",
    request_body = crate::dispatch::NotificationRequestBody,
    responses(
        (status = 200, description = "Queued, or duplicate of an earlier request", body = crate::dispatch::ApiEnvelope),
        (status = 400, description = "Invalid request body", body = crate::dispatch::ApiEnvelope),
        (status = 401, description = "Missing or invalid API key", body = crate::dispatch::ApiEnvelope),
        (status = 500, description = "Storage failure", body = crate::dispatch::ApiEnvelope),
        (status = 503, description = "Broker unavailable", body = crate::dispatch::ApiEnvelope)
    ),
    security(("api_key" = []))
)]
pub async fn create_notification(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request = NotificationRequest::from_slice(&body)?;
    let admission = state.dispatch.submit(request).await?;
    Ok(stored_json(admission.response))
}

/// Send a stored envelope as-is, so replays are byte-identical.
fn stored_json(stored: StoredResponse) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        stored.into_string(),
    )
        .into_response()
}
