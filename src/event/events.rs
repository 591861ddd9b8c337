use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::GameType;
use crate::session::SessionSummary;
use crate::storage::UserId;
use crate::stats::{CategoryState, GameState};

/// Facts published by the engine after they have happened
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A reconciliation persisted and replaced the cached aggregates
    StateReconciled {
        user_id: UserId,
        game_state: GameState,
        category_state: CategoryState,
    },

    /// A reconciliation gave up; cached state is unchanged
    ReconcileFailed {
        user_id: UserId,
        game_type: GameType,
        reason: String,
    },

    SessionEnded {
        user_id: UserId,
        session_id: Uuid,
        game_type: GameType,
        summary: SessionSummary,
    },
}

impl EngineEvent {
    pub fn user_id(&self) -> &UserId {
        match self {
            EngineEvent::StateReconciled { user_id, .. } => user_id,
            EngineEvent::ReconcileFailed { user_id, .. } => user_id,
            EngineEvent::SessionEnded { user_id, .. } => user_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::StateReconciled { .. } => "state_reconciled",
            EngineEvent::ReconcileFailed { .. } => "reconcile_failed",
            EngineEvent::SessionEnded { .. } => "session_ended",
        }
    }
}
