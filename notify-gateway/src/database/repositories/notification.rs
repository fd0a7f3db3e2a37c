//! Notification record repository.

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};

use crate::database::models::{NotificationRecordDbModel, NotificationStatus};
use crate::database::time::now_ms;
use crate::{Error, Result};

const ENTITY: &str = "NotificationRecord";

/// Notification record repository trait.
#[async_trait]
pub trait NotificationRecordRepository: Send + Sync {
    /// Insert a new record. Fails with [`Error::Conflict`] if `request_id` already exists.
    async fn create(&self, record: &NotificationRecordDbModel) -> Result<()>;

    async fn get_by_request_id(&self, request_id: &str)
    -> Result<Option<NotificationRecordDbModel>>;

    /// Set status and error message, refreshing `updated_at`.
    /// Fails with [`Error::NotFound`] if no record has this `request_id`.
    async fn update_status(
        &self,
        request_id: &str,
        status: NotificationStatus,
        error_message: Option<&str>,
    ) -> Result<()>;

    async fn count_by_status(&self, status: NotificationStatus) -> Result<i64>;
}

/// SQLx implementation of NotificationRecordRepository.
pub struct SqlxNotificationRecordRepository {
    pool: SqlitePool,
}

impl SqlxNotificationRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRecordRepository for SqlxNotificationRecordRepository {
    async fn create(&self, record: &NotificationRecordDbModel) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        NotificationRecordTxOps::create(&mut *conn, record).await
    }

    async fn get_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Option<NotificationRecordDbModel>> {
        let record = sqlx::query_as::<_, NotificationRecordDbModel>(
            "SELECT * FROM notification_records WHERE request_id = ?",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn update_status(
        &self,
        request_id: &str,
        status: NotificationStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        // error_message only survives alongside `failed`
        let error_message = match status {
            NotificationStatus::Failed => error_message,
            _ => None,
        };

        let result = sqlx::query(
            r#"
            UPDATE notification_records SET
                status = ?,
                error_message = ?,
                updated_at = ?
            WHERE request_id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(now_ms())
        .bind(request_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(ENTITY, request_id));
        }
        Ok(())
    }

    async fn count_by_status(&self, status: NotificationStatus) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notification_records WHERE status = ?")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

/// Transactional operations for notification records.
///
/// These methods operate within an existing transaction and do NOT commit.
pub struct NotificationRecordTxOps;

impl NotificationRecordTxOps {
    pub async fn create(
        tx: &mut SqliteConnection,
        record: &NotificationRecordDbModel,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_records (
                id, request_id, recipient, kind, template_id, payload,
                status, error_message, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.request_id)
        .bind(&record.recipient)
        .bind(&record.kind)
        .bind(&record.template_id)
        .bind(&record.payload)
        .bind(NotificationStatus::Pending.as_str())
        .bind(Option::<String>::None)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(tx)
        .await
        .map_err(|e| Error::from_insert(e, ENTITY, &record.request_id))?;
        Ok(())
    }
}
