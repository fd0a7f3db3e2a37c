//! Gateway configuration loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::api::server::ApiServerConfig;
use crate::broker::{AmqpConfig, RoutingTable};
use crate::dispatch::IdempotencyFailurePolicy;
use crate::{Error, Result};

/// Full gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub database_url: String,
    pub amqp: AmqpConfig,
    pub routing: RoutingTable,
    /// Secret expected in the `x-api-key` header
    pub api_key: String,
    /// Idempotency entries older than this are purged at startup
    pub idempotency_ttl: Duration,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_timeout: Duration,
    pub failure_policy: IdempotencyFailurePolicy,
    pub server: ApiServerConfig,
    pub log_dir: Option<PathBuf>,
}

impl GatewayConfig {
    /// Load `.env` if present, then read the process environment.
    ///
    /// Supported env vars:
    /// - `DATABASE_URL` (default `sqlite:gateway.db?mode=rwc`)
    /// - `RABBITMQ_URL`, `RABBITMQ_EXCHANGE`
    /// - `EMAIL_ROUTING_KEY`, `PUSH_ROUTING_KEY`, `UPDATE_ROUTING_KEY`
    /// - `GATEWAY_API_KEY` (required)
    /// - `IDP_EXPIRY_SECONDS` (default 86400)
    /// - `BREAKER_FAILURE_THRESHOLD` (default 5), `BREAKER_RESET_TIMEOUT_SECS` (default 30)
    /// - `BROKER_TIMEOUT_MS` (default 5000)
    /// - `IDEMPOTENCY_FAILURE_MODE` (`preserve` or `record`)
    /// - `API_BIND_ADDRESS`, `API_PORT`
    /// - `LOG_DIR` (unset: console only)
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = var("GATEWAY_API_KEY")
            .ok_or_else(|| Error::config("GATEWAY_API_KEY must be set to a non-empty value"))?;

        let amqp_defaults = AmqpConfig::default();
        let routing_defaults = RoutingTable::default();

        let mut server = ApiServerConfig::default();
        if let Some(bind_address) = var("API_BIND_ADDRESS") {
            server.bind_address = bind_address;
        }
        if let Some(port) = parse_var::<u16>(&var, "API_PORT")? {
            server.port = port;
        }

        let failure_policy = match var("IDEMPOTENCY_FAILURE_MODE") {
            Some(mode) => IdempotencyFailurePolicy::from_str(mode.trim()).map_err(|_| {
                Error::config(format!(
                    "IDEMPOTENCY_FAILURE_MODE must be 'preserve' or 'record', got '{mode}'"
                ))
            })?,
            None => IdempotencyFailurePolicy::default(),
        };

        Ok(Self {
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:gateway.db?mode=rwc".to_string()),
            amqp: AmqpConfig {
                url: var("RABBITMQ_URL").unwrap_or(amqp_defaults.url),
                exchange: var("RABBITMQ_EXCHANGE").unwrap_or(amqp_defaults.exchange),
                timeout: parse_var(&var, "BROKER_TIMEOUT_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(amqp_defaults.timeout),
            },
            routing: RoutingTable {
                email: var("EMAIL_ROUTING_KEY").unwrap_or(routing_defaults.email),
                push: var("PUSH_ROUTING_KEY").unwrap_or(routing_defaults.push),
                update: var("UPDATE_ROUTING_KEY").unwrap_or(routing_defaults.update),
            },
            api_key,
            idempotency_ttl: Duration::from_secs(
                parse_var(&var, "IDP_EXPIRY_SECONDS")?.unwrap_or(86_400),
            ),
            breaker_failure_threshold: parse_var(&var, "BREAKER_FAILURE_THRESHOLD")?.unwrap_or(5),
            breaker_reset_timeout: Duration::from_secs(
                parse_var(&var, "BREAKER_RESET_TIMEOUT_SECS")?.unwrap_or(30),
            ),
            failure_policy,
            server,
            log_dir: var("LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::config(format!("{key}: invalid value '{raw}': {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("GATEWAY_API_KEY", "secret")]).unwrap();

        assert_eq!(config.database_url, "sqlite:gateway.db?mode=rwc");
        assert_eq!(config.amqp.exchange, "notifications.direct");
        assert_eq!(config.amqp.timeout, Duration::from_millis(5000));
        assert_eq!(config.routing, RoutingTable::default());
        assert_eq!(config.idempotency_ttl, Duration::from_secs(86_400));
        assert_eq!(config.breaker_failure_threshold, 5);
        assert_eq!(config.breaker_reset_timeout, Duration::from_secs(30));
        assert_eq!(
            config.failure_policy,
            IdempotencyFailurePolicy::PreserveQueued
        );
        assert_eq!(config.server.port, 8080);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("GATEWAY_API_KEY", "secret"),
            ("PUSH_ROUTING_KEY", "push.custom"),
            ("BREAKER_FAILURE_THRESHOLD", "3"),
            ("IDEMPOTENCY_FAILURE_MODE", "record"),
            ("API_PORT", "9000"),
            ("LOG_DIR", "/var/log/gateway"),
        ])
        .unwrap();

        assert_eq!(config.routing.push, "push.custom");
        assert_eq!(config.routing.email, "notifications.email");
        assert_eq!(config.breaker_failure_threshold, 3);
        assert_eq!(config.failure_policy, IdempotencyFailurePolicy::RecordFailure);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/gateway")));
    }

    #[test]
    fn test_missing_api_key_is_error() {
        assert!(matches!(load(&[]), Err(Error::Configuration(_))));
        assert!(matches!(
            load(&[("GATEWAY_API_KEY", "  ")]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        for (key, value) in [
            ("BROKER_TIMEOUT_MS", "soon"),
            ("BREAKER_FAILURE_THRESHOLD", "-1"),
            ("API_PORT", "70000"),
        ] {
            let result = load(&[("GATEWAY_API_KEY", "secret"), (key, value)]);
            assert!(matches!(result, Err(Error::Configuration(_))), "{key}={value}");
        }
        assert!(load(&[("GATEWAY_API_KEY", "secret"), ("IDEMPOTENCY_FAILURE_MODE", "drop")]).is_err());
    }
}
