use async_trait::async_trait;
use thiserror::Error;

use super::events::EngineEvent;
use crate::storage::UserId;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Handler error: {0}")]
    HandlerError(String),
}

/// Reacts to one user's engine events
#[async_trait]
pub trait EngineEventHandler: Send + Sync {
    async fn handle_event(&self, user_id: &UserId, event: EngineEvent) -> Result<(), EventError>;

    /// Name used in logs
    fn handler_name(&self) -> &'static str;
}
