// Observer channel for reconciled state.
//
// The reconciliation controller publishes here once state is persisted; views
// such as the session state mirror subscribe per user.

pub use bus::EventBus;
pub use events::EngineEvent;
pub use handler::{EngineEventHandler, EventError};
pub use subscription::UserSubscription;

mod bus;
mod events;
mod handler;
mod subscription;
