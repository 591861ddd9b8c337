use thiserror::Error;
use uuid::Uuid;

use super::models::SessionPhase;
use crate::reconcile::ReconcileError;
use crate::stats::StatsError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("Session {0} not found")]
    NotFound(Uuid),

    #[error("Cannot {action} a session in phase {from}")]
    InvalidTransition {
        from: SessionPhase,
        action: &'static str,
    },

    #[error(transparent)]
    Validation(#[from] StatsError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Session store error: {0}")]
    Repository(String),
}
