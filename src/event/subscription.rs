use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{bus::EventBus, handler::EngineEventHandler};
use crate::storage::UserId;

/// Routes one user's events to a handler from a background task
pub struct UserSubscription {
    user_id: UserId,
    handler: Arc<dyn EngineEventHandler>,
    event_bus: EventBus,
}

impl UserSubscription {
    pub fn new(user_id: UserId, handler: Arc<dyn EngineEventHandler>, event_bus: EventBus) -> Self {
        Self {
            user_id,
            handler,
            event_bus,
        }
    }

    /// Subscribes before returning, so events emitted after `start` resolves are delivered
    pub async fn start(self) -> JoinHandle<()> {
        let user_id = self.user_id.clone();
        let handler_name = self.handler.handler_name();

        info!(user_id = %user_id, handler = handler_name, "Starting user subscription");

        let mut receiver = self.event_bus.subscribe_to_user(&user_id).await;

        tokio::spawn(async move {
            loop {
                let event = match receiver.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            user_id = %user_id,
                            handler = handler_name,
                            skipped,
                            "Subscriber lagged; older events dropped"
                        );
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                debug!(
                    user_id = %user_id,
                    handler = handler_name,
                    event_type = event.event_type(),
                    "Received user event"
                );

                if let Err(e) = self.handler.handle_event(&user_id, event).await {
                    warn!(
                        user_id = %user_id,
                        handler = handler_name,
                        error = %e,
                        "User event handler failed"
                    );
                }
            }

            info!(user_id = %user_id, handler = handler_name, "User subscription ended");
        })
    }
}
