use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::events::EngineEvent;
use crate::storage::UserId;

const DEFAULT_USER_CAPACITY: usize = 100;

/// Per-user broadcast channels for published engine events
#[derive(Debug, Clone)]
pub struct EventBus {
    /// user_id -> sender
    user_channels: Arc<RwLock<HashMap<UserId, broadcast::Sender<EngineEvent>>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_USER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            user_channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    async fn sender_for(&self, user_id: &UserId) -> broadcast::Sender<EngineEvent> {
        if let Some(sender) = self.user_channels.read().await.get(user_id) {
            return sender.clone();
        }

        debug!(user_id = %user_id, "Creating user event channel");
        let mut channels = self.user_channels.write().await;
        channels
            .entry(user_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Emits an event to every subscriber of the user; returns how many received it
    pub async fn emit_to_user(&self, user_id: &UserId, event: EngineEvent) -> usize {
        let event_type = event.event_type();
        match self.sender_for(user_id).await.send(event) {
            Ok(receivers) => {
                debug!(user_id = %user_id, event_type, receivers, "User event emitted");
                receivers
            }
            Err(_) => {
                debug!(user_id = %user_id, event_type, "User event emitted with no receivers");
                0
            }
        }
    }

    /// Drops the user's channel. Subscribers see it close once in-flight emits finish.
    pub async fn remove_user(&self, user_id: &UserId) -> bool {
        let removed = self.user_channels.write().await.remove(user_id).is_some();
        if removed {
            debug!(user_id = %user_id, "User event channel removed");
        }
        removed
    }

    pub async fn channel_count(&self) -> usize {
        self.user_channels.read().await.len()
    }

    pub async fn subscribe_to_user(&self, user_id: &UserId) -> broadcast::Receiver<EngineEvent> {
        self.sender_for(user_id).await.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameType;
    use crate::stats::{CategoryState, GameState};

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    fn reconciled(user_id: &UserId, total: u64) -> EngineEvent {
        let mut game_state = GameState::empty(GameType::Math);
        game_state.total_questions = total;
        EngineEvent::StateReconciled {
            user_id: user_id.clone(),
            game_state,
            category_state: CategoryState::empty("add"),
        }
    }

    #[tokio::test]
    async fn subscribers_only_see_their_user() {
        let bus = EventBus::new();
        let alice = user("alice");
        let bob = user("bob");
        let mut alice_rx = bus.subscribe_to_user(&alice).await;
        let mut bob_rx = bus.subscribe_to_user(&bob).await;

        assert_eq!(bus.emit_to_user(&alice, reconciled(&alice, 1)).await, 1);

        let event = alice_rx.recv().await.unwrap();
        assert_eq!(event.user_id(), &alice);
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn removing_a_user_closes_its_subscribers() {
        let bus = EventBus::new();
        let dave = user("dave");
        let mut rx = bus.subscribe_to_user(&dave).await;
        assert_eq!(bus.channel_count().await, 1);

        assert!(bus.remove_user(&dave).await);
        assert_eq!(bus.channel_count().await, 0);
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn emitting_without_subscribers_is_not_an_error() {
        let bus = EventBus::new();
        let carol = user("carol");
        assert_eq!(bus.emit_to_user(&carol, reconciled(&carol, 1)).await, 0);
    }
}
