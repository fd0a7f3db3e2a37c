//! Application-wide error types.

use thiserror::Error;

use crate::broker::PublishError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Entity already exists: {entity_type} with id {id}")]
    Conflict { entity_type: String, id: String },

    #[error("Validation error: {message}")]
    Validation { code: &'static str, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Publish(#[from] PublishError),

    #[error("Circuit breaker is open - broker is unavailable")]
    CircuitOpen,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn conflict(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Client input error. `code` is the machine-readable reason reported to callers.
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Map a unique-constraint violation to [`Error::Conflict`], leave anything else untouched.
    pub(crate) fn from_insert(
        err: sqlx::Error,
        entity_type: &'static str,
        id: &str,
    ) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::conflict(entity_type, id)
            }
            _ => Self::DatabaseSqlx(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_unique_insert_error_passes_through() {
        let err = Error::from_insert(sqlx::Error::RowNotFound, "NotificationRecord", "r-1");
        assert!(matches!(err, Error::DatabaseSqlx(sqlx::Error::RowNotFound)));
    }
}
