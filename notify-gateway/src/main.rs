use std::sync::Arc;

use notify_gateway::api::middleware::ApiKeyAuth;
use notify_gateway::api::{ApiServer, AppState};
use notify_gateway::broker::{AmqpPublisher, CircuitBreaker};
use notify_gateway::config::GatewayConfig;
use notify_gateway::database::repositories::{IdempotencyRepository, SqlxIdempotencyRepository};
use notify_gateway::dispatch::DispatchService;
use notify_gateway::{database, logging};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;
    let _logging = logging::init_logging(config.log_dir.as_deref())?;

    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let purged = SqlxIdempotencyRepository::new(pool.clone())
        .purge_expired(config.idempotency_ttl)
        .await?;
    if purged > 0 {
        info!(purged, "Removed expired idempotency entries");
    }

    let publisher = Arc::new(AmqpPublisher::new(config.amqp.clone()));
    let breaker = Arc::new(CircuitBreaker::new(
        "rabbitmq",
        config.breaker_failure_threshold,
        config.breaker_reset_timeout,
    ));
    let dispatch = Arc::new(
        DispatchService::new(pool.clone(), publisher, breaker)
            .with_routing(config.routing.clone())
            .with_failure_policy(config.failure_policy),
    );

    let state = AppState::new(dispatch.clone(), ApiKeyAuth::new(config.api_key.clone()));
    let server = ApiServer::new(config.server.clone(), state);
    spawn_signal_listener(server.cancel_token());

    info!(
        exchange = %config.amqp.exchange,
        failure_policy = %config.failure_policy,
        "notify-gateway starting"
    );

    let served = server.run().await;

    dispatch.shutdown().await;
    pool.close().await;
    info!("notify-gateway stopped");

    served?;
    Ok(())
}

fn spawn_signal_listener(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
                        _ = tokio::signal::ctrl_c() => info!("SIGINT received, shutting down"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to register SIGTERM handler");
                    tokio::signal::ctrl_c().await.ok();
                    info!("SIGINT received, shutting down");
                }
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
            info!("Ctrl-C received, shutting down");
        }
        cancel_token.cancel();
    });
}
