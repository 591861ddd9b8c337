use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use crate::reconcile::{ReconcileError, ReconciliationController};
use crate::session::{SessionError, SessionService};
use crate::stats::StatsError;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub controller: ReconciliationController,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub fn new(controller: ReconciliationController, sessions: Arc<SessionService>) -> Self {
        Self {
            controller,
            sessions,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<StatsError> for AppError {
    fn from(err: StatsError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Validation(e) => e.into(),
            e @ ReconcileError::ConcurrencyConflict { .. } => AppError::Conflict(e.to_string()),
            e @ ReconcileError::PersistenceFailed { .. } => AppError::Unavailable(e.to_string()),
            ReconcileError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => AppError::NotFound(format!("session {}", id)),
            e @ SessionError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
            SessionError::Validation(e) => e.into(),
            SessionError::Reconcile(e) => e.into(),
            SessionError::Repository(msg) => AppError::Internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
