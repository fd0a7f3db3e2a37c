//! SQLite persistence for notification records and idempotency keys.
//!
//! Pool setup, embedded migrations, and the immediate-mode transaction used
//! by the admission path.

pub mod models;
pub mod repositories;
pub mod retry;
pub mod time;

use std::str::FromStr;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite, SqliteConnection};

pub type DbPool = Pool<Sqlite>;

const DEFAULT_POOL_SIZE: u32 = 10;

/// How long a connection waits on a locked database before `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Open a WAL-mode pool with at most `max_connections` connections.
///
/// `database_url` is a sqlx SQLite URL such as `sqlite:gateway.db?mode=rwc`
/// or `sqlite::memory:`.
pub async fn init_pool_with_size(
    database_url: &str,
    max_connections: u32,
) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true)
        // negative: KiB, about 16MB
        .pragma("cache_size", "-16000")
        .pragma("temp_store", "MEMORY")
        .pragma("journal_size_limit", (32 * 1024 * 1024).to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await?;

    tracing::info!(max_connections, "Database pool ready");
    Ok(pool)
}

pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    init_pool_with_size(database_url, DEFAULT_POOL_SIZE).await
}

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &DbPool) -> crate::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database schema up to date");
    Ok(())
}

/// Trivial round trip used by the health probe.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    let _: (i64,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

/// Start a transaction that holds the write lock from its first statement.
pub async fn begin_immediate(pool: &DbPool) -> Result<ImmediateTransaction, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(ImmediateTransaction { conn, open: true })
}

/// A `BEGIN IMMEDIATE` transaction on a pooled connection.
///
/// Two admissions never deadlock upgrading a read lock. If dropped while
/// still open the connection is closed instead of returned to the pool,
/// which discards the pending writes.
pub struct ImmediateTransaction {
    conn: PoolConnection<Sqlite>,
    open: bool,
}

impl ImmediateTransaction {
    pub async fn commit(mut self) -> Result<(), sqlx::Error> {
        self.finish("COMMIT").await
    }

    pub async fn rollback(mut self) -> Result<(), sqlx::Error> {
        self.finish("ROLLBACK").await
    }

    async fn finish(&mut self, statement: &'static str) -> Result<(), sqlx::Error> {
        sqlx::query(statement).execute(&mut *self.conn).await?;
        self.open = false;
        Ok(())
    }
}

impl std::ops::Deref for ImmediateTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        &self.conn
    }
}

impl std::ops::DerefMut for ImmediateTransaction {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

impl Drop for ImmediateTransaction {
    fn drop(&mut self) {
        if self.open {
            self.conn.close_on_drop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn count_keys(pool: &DbPool) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM idempotency_keys")
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn test_ping() {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        ping(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("wal.db").display());
        let pool = init_pool(&url).await.unwrap();

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[tokio::test]
    async fn test_commit_and_rollback() {
        let pool = init_pool_with_size("sqlite::memory:", 1).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let insert = "INSERT INTO idempotency_keys (request_id, response_payload, created_at) VALUES (?, '{}', 0)";

        let mut tx = begin_immediate(&pool).await.unwrap();
        sqlx::query(insert).bind("kept").execute(&mut *tx).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = begin_immediate(&pool).await.unwrap();
        sqlx::query(insert).bind("discarded").execute(&mut *tx).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(count_keys(&pool).await, 1);
    }
}
