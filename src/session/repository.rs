use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{errors::SessionError, models::GameSession};
use crate::storage::UserId;

/// Storage for live session records. Updates replace the whole record.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: &GameSession) -> Result<(), SessionError>;
    async fn get_session(&self, session_id: Uuid) -> Result<Option<GameSession>, SessionError>;
    async fn replace_session(&self, session: &GameSession) -> Result<(), SessionError>;
    async fn delete_session(&self, session_id: Uuid) -> Result<(), SessionError>;
    /// Sessions that are over and ended at or before `cutoff`
    async fn ended_sessions(&self, cutoff: DateTime<Utc>) -> Result<Vec<GameSession>, SessionError>;
    async fn user_has_sessions(&self, user_id: &UserId) -> Result<bool, SessionError>;
}

/// In-memory implementation of SessionRepository; sessions are lost on restart
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<Uuid, GameSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    async fn create_session(&self, session: &GameSession) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            warn!("Session already exists in memory");
            return Err(SessionError::Repository(format!(
                "session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id, session.clone());
        debug!(user_id = %session.user_id, "Session created in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_session(&self, session_id: Uuid) -> Result<Option<GameSession>, SessionError> {
        let session = self.sessions.read().await.get(&session_id).cloned();
        debug!(found = session.is_some(), "Fetched session from memory");
        Ok(session)
    }

    #[instrument(skip(self, session), fields(session_id = %session.id))]
    async fn replace_session(&self, session: &GameSession) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                debug!(phase = %session.phase, "Session replaced in memory");
                Ok(())
            }
            None => {
                warn!("Session not found for replacement");
                Err(SessionError::NotFound(session.id))
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, session_id: Uuid) -> Result<(), SessionError> {
        if self.sessions.write().await.remove(&session_id).is_none() {
            warn!("Session not found for deletion");
            return Err(SessionError::NotFound(session_id));
        }
        debug!("Session deleted from memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn ended_sessions(&self, cutoff: DateTime<Utc>) -> Result<Vec<GameSession>, SessionError> {
        let sessions = self.sessions.read().await;
        let ended: Vec<GameSession> = sessions
            .values()
            .filter(|session| session.phase.is_over())
            .filter(|session| session.ended_at.is_some_and(|ended_at| ended_at <= cutoff))
            .cloned()
            .collect();
        debug!(count = ended.len(), "Found ended sessions");
        Ok(ended)
    }

    async fn user_has_sessions(&self, user_id: &UserId) -> Result<bool, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.values().any(|session| &session.user_id == user_id))
    }
}
