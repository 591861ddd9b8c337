use thiserror::Error;

use crate::retry::Retryable;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("Transient storage error: {0}")]
    Transient(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Write conflict: {0}")]
    Conflict(String),
}

impl Retryable for StorageError {
    fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::Conflict(db.message().to_string())
            }
            sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => {
                StorageError::Serialization(err.to_string())
            }
            _ => StorageError::Transient(err.to_string()),
        }
    }
}
