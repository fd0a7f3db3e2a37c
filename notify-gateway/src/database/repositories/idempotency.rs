//! Idempotency key repository.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};

use crate::database::models::{IdempotencyKeyDbModel, StoredResponse};
use crate::database::time::now_ms;
use crate::{Error, Result};

const ENTITY: &str = "IdempotencyKey";

/// Idempotency key repository trait.
#[async_trait]
pub trait IdempotencyRepository: Send + Sync {
    /// Exact-match lookup. Entries are returned regardless of age.
    async fn find(&self, request_id: &str) -> Result<Option<StoredResponse>>;

    /// Insert a new entry. Fails with [`Error::Conflict`] if the key already exists.
    async fn reserve(&self, request_id: &str, placeholder: &StoredResponse) -> Result<()>;

    /// Overwrite the stored response. A missing key is a no-op; returns whether a row changed.
    async fn finalize(&self, request_id: &str, response: &StoredResponse) -> Result<bool>;

    /// Delete entries created more than `ttl` ago. Returns the number removed.
    async fn purge_expired(&self, ttl: Duration) -> Result<u64>;
}

/// SQLx implementation of IdempotencyRepository.
pub struct SqlxIdempotencyRepository {
    pool: SqlitePool,
}

impl SqlxIdempotencyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotencyRepository for SqlxIdempotencyRepository {
    async fn find(&self, request_id: &str) -> Result<Option<StoredResponse>> {
        let entry = sqlx::query_as::<_, IdempotencyKeyDbModel>(
            "SELECT * FROM idempotency_keys WHERE request_id = ?",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry.map(StoredResponse::from))
    }

    async fn reserve(&self, request_id: &str, placeholder: &StoredResponse) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        IdempotencyTxOps::reserve(&mut *conn, request_id, placeholder).await
    }

    async fn finalize(&self, request_id: &str, response: &StoredResponse) -> Result<bool> {
        let result =
            sqlx::query("UPDATE idempotency_keys SET response_payload = ? WHERE request_id = ?")
                .bind(response.as_str())
                .bind(request_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, ttl: Duration) -> Result<u64> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_ms().saturating_sub(ttl_ms);

        let result = sqlx::query("DELETE FROM idempotency_keys WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Transactional operations for idempotency keys.
///
/// These methods operate within an existing transaction and do NOT commit.
pub struct IdempotencyTxOps;

impl IdempotencyTxOps {
    pub async fn reserve(
        tx: &mut SqliteConnection,
        request_id: &str,
        placeholder: &StoredResponse,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO idempotency_keys (request_id, response_payload, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(request_id)
        .bind(placeholder.as_str())
        .bind(now_ms())
        .execute(tx)
        .await
        .map_err(|e| Error::from_insert(e, ENTITY, request_id))?;
        Ok(())
    }
}
