use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::event::{EngineEvent, EngineEventHandler, EventError};
use crate::game::GameType;
use crate::stats::GameState;
use crate::storage::UserId;

/// Client-side copy of a user's latest published game states. Each event replaces
/// the stored state for its game type whole.
#[derive(Debug, Default)]
pub struct StateMirror {
    states: RwLock<HashMap<GameType, GameState>>,
}

impl StateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn latest(&self, game_type: GameType) -> Option<GameState> {
        self.states.read().await.get(&game_type).cloned()
    }
}

#[async_trait]
impl EngineEventHandler for StateMirror {
    async fn handle_event(&self, user_id: &UserId, event: EngineEvent) -> Result<(), EventError> {
        if let EngineEvent::StateReconciled { game_state, .. } = event {
            debug!(
                user_id = %user_id,
                game_type = %game_state.game_type,
                total_questions = game_state.total_questions,
                "Mirroring published game state"
            );
            self.states
                .write()
                .await
                .insert(game_state.game_type, game_state);
        }
        Ok(())
    }

    fn handler_name(&self) -> &'static str {
        "StateMirror"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventBus, UserSubscription};
    use crate::stats::CategoryState;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn mirror_replaces_state_on_each_event() {
        let user_id = UserId::parse("u1").unwrap();
        let bus = EventBus::new();
        let mirror = Arc::new(StateMirror::new());
        UserSubscription::new(user_id.clone(), mirror.clone(), bus.clone())
            .start()
            .await;

        for total in [1, 2] {
            let mut game_state = GameState::empty(GameType::Trivia);
            game_state.total_questions = total;
            bus.emit_to_user(
                &user_id,
                EngineEvent::StateReconciled {
                    user_id: user_id.clone(),
                    game_state,
                    category_state: CategoryState::empty("1990s"),
                },
            )
            .await;
        }

        let mut latest = None;
        for _ in 0..50 {
            latest = mirror.latest(GameType::Trivia).await;
            if latest.as_ref().map(|s| s.total_questions) == Some(2) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(latest.map(|s| s.total_questions), Some(2));
        assert!(mirror.latest(GameType::Math).await.is_none());
    }
}
