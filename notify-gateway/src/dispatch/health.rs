//! Dependency health report.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::broker::CircuitState;

/// Reachability of a single dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub reachable: bool,
    /// `ok`, or the error observed while probing
    pub detail: String,
}

impl ComponentHealth {
    pub fn reachable() -> Self {
        Self {
            reachable: true,
            detail: "ok".to_string(),
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self {
            reachable: false,
            detail: detail.into(),
        }
    }
}

/// Health of the gateway and its dependencies.
///
/// `status` is always `ok`: the gateway itself answered. Dependency failures
/// are reported per component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthReport {
    pub status: String,
    pub storage: ComponentHealth,
    pub broker: ComponentHealth,
    #[schema(value_type = String, example = "closed")]
    pub circuit_breaker: CircuitState,
}

impl HealthReport {
    pub fn new(storage: ComponentHealth, broker: ComponentHealth, breaker: CircuitState) -> Self {
        Self {
            status: "ok".to_string(),
            storage,
            broker,
            circuit_breaker: breaker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serialization() {
        let report = HealthReport::new(
            ComponentHealth::reachable(),
            ComponentHealth::unreachable("connection refused"),
            CircuitState::HalfOpen,
        );

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({
                "status": "ok",
                "storage": {"reachable": true, "detail": "ok"},
                "broker": {"reachable": false, "detail": "connection refused"},
                "circuit_breaker": "half_open",
            })
        );
    }
}
