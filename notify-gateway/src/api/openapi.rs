//! OpenAPI document generated with `utoipa`.

use utoipa::OpenApi;

use crate::dispatch::envelope::QueuedData;
use crate::dispatch::{ApiEnvelope, ComponentHealth, HealthReport, NotificationRequestBody};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "notify-gateway API",
        version = "0.1.0",
        description = "Idempotent notification admission. Accepted requests are recorded and published to the message broker.",
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    tags(
        (name = "notifications", description = "Notification admission"),
        (name = "health", description = "Dependency health")
    ),
    paths(
        crate::api::routes::notifications::create_notification,
        crate::api::routes::health::health_check,
    ),
    components(schemas(
        ApiEnvelope,
        QueuedData,
        NotificationRequestBody,
        HealthReport,
        ComponentHealth,
        crate::database::models::NotificationKind,
    )),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new(
                            crate::api::middleware::API_KEY_HEADER,
                        ),
                    ),
                ),
            );
        }
    }
}
