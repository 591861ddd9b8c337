use thiserror::Error;

use crate::retry::RetryFailure;
use crate::stats::StatsError;
use crate::storage::StorageError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] StatsError),

    #[error("Persistence failed after {attempts} attempts: {source}")]
    PersistenceFailed { attempts: u32, source: StorageError },

    #[error("Timed out waiting for the writer lock on {key}")]
    ConcurrencyConflict { key: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A storage error raised before any write was tried, such as a record that fails to encode
impl From<StorageError> for ReconcileError {
    fn from(source: StorageError) -> Self {
        ReconcileError::Internal(format!("failed to prepare write: {}", source))
    }
}

impl From<RetryFailure<StorageError>> for ReconcileError {
    fn from(failure: RetryFailure<StorageError>) -> Self {
        ReconcileError::PersistenceFailed {
            attempts: failure.attempts,
            source: failure.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_encoding_failure_is_internal() {
        let err = ReconcileError::from(StorageError::Serialization("bad float".to_string()));
        assert!(matches!(err, ReconcileError::Internal(msg) if msg.contains("bad float")));
    }

    #[test]
    fn exhausted_retries_are_persistence_failures() {
        let err = ReconcileError::from(RetryFailure {
            attempts: 4,
            error: StorageError::Transient("down".to_string()),
        });
        assert!(matches!(err, ReconcileError::PersistenceFailed { attempts: 4, .. }));
    }
}
