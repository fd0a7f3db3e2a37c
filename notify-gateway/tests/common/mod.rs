#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notify_gateway::broker::{
    CircuitBreaker, MessageHeaders, OutboundMessage, PublishError, Publisher,
};
use notify_gateway::database::{self, DbPool};
use notify_gateway::dispatch::{DispatchService, NotificationRequest};
use parking_lot::Mutex;

/// One publish as seen by the broker.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub routing_key: String,
    pub message: OutboundMessage,
    pub correlation_id: String,
    pub headers: MessageHeaders,
}

/// In-process publisher that records calls and fails on demand.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<PublishedMessage>>,
    scripted_failures: Mutex<VecDeque<PublishError>>,
    fail_all: Mutex<bool>,
    probe_ok: Mutex<bool>,
    calls: Mutex<usize>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        let publisher = Self::default();
        *publisher.probe_ok.lock() = true;
        Arc::new(publisher)
    }

    /// Fail the next publish with `err`.
    pub fn fail_next(&self, err: PublishError) {
        self.scripted_failures.lock().push_back(err);
    }

    /// Fail every publish until cleared.
    pub fn set_fail_all(&self, fail: bool) {
        *self.fail_all.lock() = fail;
    }

    pub fn set_probe_ok(&self, ok: bool) {
        *self.probe_ok.lock() = ok;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        routing_key: &str,
        message: &OutboundMessage,
        correlation_id: &str,
        headers: &MessageHeaders,
    ) -> Result<(), PublishError> {
        *self.calls.lock() += 1;

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.scripted_failures.lock().pop_front() {
            return Err(err);
        }
        if *self.fail_all.lock() {
            return Err(PublishError::Connect("connection refused".to_string()));
        }

        self.published.lock().push(PublishedMessage {
            routing_key: routing_key.to_string(),
            message: message.clone(),
            correlation_id: correlation_id.to_string(),
            headers: headers.clone(),
        });
        Ok(())
    }

    async fn probe(&self) -> Result<(), PublishError> {
        if *self.probe_ok.lock() {
            Ok(())
        } else {
            Err(PublishError::Connect("connection refused".to_string()))
        }
    }
}

pub async fn memory_pool() -> DbPool {
    let pool = database::init_pool("sqlite::memory:").await.unwrap();
    database::run_migrations(&pool).await.unwrap();
    pool
}

/// Make every idempotency insert fail after the record insert has run.
pub async fn reject_idempotency_inserts(pool: &DbPool) {
    sqlx::query(
        "CREATE TRIGGER reject_idempotency_keys BEFORE INSERT ON idempotency_keys \
         BEGIN SELECT RAISE(ABORT, 'idempotency store unavailable'); END",
    )
    .execute(pool)
    .await
    .unwrap();
}

/// Backdate every idempotency entry to the epoch.
pub async fn age_idempotency_entries(pool: &DbPool) {
    sqlx::query("UPDATE idempotency_keys SET created_at = 0")
        .execute(pool)
        .await
        .unwrap();
}

pub fn breaker(threshold: u32, reset_timeout: Duration) -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::new("test-broker", threshold, reset_timeout))
}

pub fn service(
    pool: &DbPool,
    publisher: &Arc<RecordingPublisher>,
    breaker: &Arc<CircuitBreaker>,
) -> DispatchService {
    DispatchService::new(pool.clone(), publisher.clone(), breaker.clone())
}

pub fn request(value: serde_json::Value) -> NotificationRequest {
    NotificationRequest::from_json(value).unwrap()
}

pub async fn count_rows(pool: &DbPool, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap();
    count
}
