//! Dispatch service.
//!
//! Runs one admission end to end: deduplicate, record intent, publish through
//! the shared circuit breaker, and settle the record and idempotency entry.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::envelope::ApiEnvelope;
use super::health::{ComponentHealth, HealthReport};
use super::outcome::{DeliveryOutcome, DeliveryOutcomeSink};
use super::request::NotificationRequest;
use crate::broker::{BreakerError, CircuitBreaker, Publisher, RoutingTable};
use crate::database::models::{NotificationRecordDbModel, NotificationStatus, StoredResponse};
use crate::database::repositories::{
    IdempotencyRepository, IdempotencyTxOps, NotificationRecordRepository,
    NotificationRecordTxOps, SqlxIdempotencyRepository, SqlxNotificationRecordRepository,
};
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::{self, DbPool, begin_immediate};
use crate::{Error, Result};

/// What the idempotency entry holds after a failed publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum IdempotencyFailurePolicy {
    /// Keep the "queued" placeholder; a retry is told "queued" while the record is `failed`.
    #[default]
    #[strum(serialize = "preserve")]
    PreserveQueued,
    /// Overwrite the entry with the failure response; a retry sees the failure.
    #[strum(serialize = "record")]
    RecordFailure,
}

/// Outcome of a successful admission call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Serialized response envelope
    pub response: StoredResponse,
    /// Whether the response was replayed from the idempotency store
    pub duplicate: bool,
}

/// Admission pipeline over the record store, idempotency store and broker.
pub struct DispatchService {
    pool: DbPool,
    records: Arc<dyn NotificationRecordRepository>,
    idempotency: Arc<dyn IdempotencyRepository>,
    publisher: Arc<dyn Publisher>,
    breaker: Arc<CircuitBreaker>,
    routing: RoutingTable,
    failure_policy: IdempotencyFailurePolicy,
}

impl DispatchService {
    /// Create a dispatch service backed by the SQLite stores on `pool`.
    pub fn new(pool: DbPool, publisher: Arc<dyn Publisher>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            records: Arc::new(SqlxNotificationRecordRepository::new(pool.clone())),
            idempotency: Arc::new(SqlxIdempotencyRepository::new(pool.clone())),
            pool,
            publisher,
            breaker,
            routing: RoutingTable::default(),
            failure_policy: IdempotencyFailurePolicy::default(),
        }
    }

    pub fn with_routing(mut self, routing: RoutingTable) -> Self {
        self.routing = routing;
        self
    }

    pub fn with_failure_policy(mut self, policy: IdempotencyFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn records(&self) -> &Arc<dyn NotificationRecordRepository> {
        &self.records
    }

    pub fn idempotency(&self) -> &Arc<dyn IdempotencyRepository> {
        &self.idempotency
    }

    /// Admit a validated request.
    ///
    /// For a fixed `request_id` the record is created and the publish is
    /// attempted at most once; later calls replay the stored response.
    /// Errors: storage failures before publish, and [`Error::Publish`] or
    /// [`Error::CircuitOpen`] after the record was marked `failed`.
    pub async fn submit(&self, request: NotificationRequest) -> Result<Admission> {
        let request_id = request.request_id.as_str();

        if let Some(stored) = self.idempotency.find(request_id).await? {
            debug!(request_id, "Duplicate request, replaying stored response");
            return Ok(Admission {
                response: stored,
                duplicate: true,
            });
        }

        let record = request.to_record()?;
        let queued = ApiEnvelope::queued(request_id).to_stored()?;

        match self.admit(&record, &queued).await {
            Ok(()) => {}
            Err(Error::Conflict { .. }) => {
                // A concurrent admission committed first, or the record outlived its entry.
                return match self.idempotency.find(request_id).await? {
                    Some(stored) => {
                        debug!(request_id, "Lost admission race, replaying stored response");
                        Ok(Admission {
                            response: stored,
                            duplicate: true,
                        })
                    }
                    None => self.replay_from_record(request_id).await,
                };
            }
            Err(e) => {
                error!(request_id, error = %e, "Failed to record notification");
                return Err(e);
            }
        }

        let routing_key = self.routing.routing_key(request.kind);
        let message = request.to_message(record.created_at);
        let headers = message.headers();

        let published = self
            .breaker
            .execute(|| {
                self.publisher
                    .publish(routing_key, &message, request_id, &headers)
            })
            .await;

        if let Err(e) = published {
            let err = match e {
                BreakerError::Open => Error::CircuitOpen,
                BreakerError::Inner(e) => Error::Publish(e),
            };
            self.settle_failure(request_id, &err).await;
            return Err(err);
        }

        info!(
            request_id,
            kind = %request.kind,
            routing_key,
            "Notification queued"
        );

        if let Err(e) = self
            .records
            .update_status(request_id, NotificationStatus::Pending, None)
            .await
        {
            warn!(request_id, error = %e, "Failed to re-affirm pending status");
        }

        match self.idempotency.finalize(request_id, &queued).await {
            Ok(true) => {}
            Ok(false) => warn!(request_id, "Idempotency entry vanished before finalize"),
            Err(e) => warn!(request_id, error = %e, "Failed to finalize idempotency entry"),
        }

        Ok(Admission {
            response: queued,
            duplicate: false,
        })
    }

    /// Create the `pending` record and reserve the idempotency entry in one transaction.
    async fn admit(&self, record: &NotificationRecordDbModel, queued: &StoredResponse) -> Result<()> {
        retry_on_sqlite_busy("admit_notification", || async {
            let mut tx = begin_immediate(&self.pool).await?;

            let written = async {
                NotificationRecordTxOps::create(&mut *tx, record).await?;
                IdempotencyTxOps::reserve(&mut *tx, &record.request_id, queued).await
            }
            .await;

            match written {
                Ok(()) => {
                    tx.commit().await?;
                    Ok(())
                }
                Err(e) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        debug!(error = %rollback_err, "Rollback after failed admission failed");
                    }
                    Err(e)
                }
            }
        })
        .await
    }

    /// Answer a request whose record outlived its idempotency entry (purged by TTL).
    ///
    /// The response is rebuilt from the record the same way the admission that
    /// created it would have stored it, and the entry is restored.
    async fn replay_from_record(&self, request_id: &str) -> Result<Admission> {
        let record = self
            .records
            .get_by_request_id(request_id)
            .await?
            .ok_or_else(|| Error::conflict("IdempotencyKey", request_id))?;

        let envelope = match (record.status(), record.error_message.as_deref()) {
            (Some(NotificationStatus::Failed), Some(reason))
                if self.failure_policy == IdempotencyFailurePolicy::RecordFailure =>
            {
                ApiEnvelope::publish_failed(reason)
            }
            _ => ApiEnvelope::queued(request_id),
        };
        let response = envelope.to_stored()?;

        if let Err(e) = self.idempotency.reserve(request_id, &response).await {
            debug!(request_id, error = %e, "Could not restore idempotency entry");
        }
        info!(request_id, status = %record.status, "Replaying response rebuilt from record");

        Ok(Admission {
            response,
            duplicate: true,
        })
    }

    async fn settle_failure(&self, request_id: &str, err: &Error) {
        let reason = err.to_string();
        warn!(request_id, error = %reason, "Publish failed");

        if let Err(e) = self
            .records
            .update_status(request_id, NotificationStatus::Failed, Some(&reason))
            .await
        {
            error!(request_id, error = %e, "Failed to mark notification as failed");
        }

        if self.failure_policy == IdempotencyFailurePolicy::RecordFailure {
            let stored = match ApiEnvelope::publish_failed(&reason).to_stored() {
                Ok(stored) => stored,
                Err(e) => {
                    error!(request_id, error = %e, "Failed to render failure response");
                    return;
                }
            };
            if let Err(e) = self.idempotency.finalize(request_id, &stored).await {
                warn!(request_id, error = %e, "Failed to record failure in idempotency entry");
            }
        }
    }

    /// Probe storage and broker. Neither probe writes state or touches the breaker.
    pub async fn health(&self) -> HealthReport {
        let storage = match database::ping(&self.pool).await {
            Ok(()) => ComponentHealth::reachable(),
            Err(e) => ComponentHealth::unreachable(format!("error: {e}")),
        };

        let broker = match self.publisher.probe().await {
            Ok(()) => ComponentHealth::reachable(),
            Err(e) => ComponentHealth::unreachable(format!("error: {e}")),
        };

        HealthReport::new(storage, broker, self.breaker.state())
    }

    /// Release the broker connection.
    pub async fn shutdown(&self) {
        self.publisher.close().await;
    }
}

#[async_trait]
impl DeliveryOutcomeSink for DispatchService {
    async fn report_outcome(&self, request_id: &str, outcome: DeliveryOutcome) -> Result<()> {
        let record = self
            .records
            .get_by_request_id(request_id)
            .await?
            .ok_or_else(|| Error::not_found("NotificationRecord", request_id))?;

        let next = outcome.status();
        let current = record
            .status()
            .ok_or_else(|| Error::Other(format!("Unknown status '{}'", record.status)))?;

        if !current.can_transition_to(next) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        self.records
            .update_status(request_id, next, outcome.error_message())
            .await?;
        debug!(request_id, from = %current, to = %next, "Delivery outcome applied");
        Ok(())
    }
}
