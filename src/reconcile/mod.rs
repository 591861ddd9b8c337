pub mod cache;
pub mod controller;
pub mod handlers;
pub mod locks;
pub mod phase;

mod errors;

pub use cache::{CacheSlot, StateCache};
pub use controller::{ReconciledState, ReconciliationController, ReconciliationControllerBuilder};
pub use errors::ReconcileError;
pub use handlers::{current_state, submit_attempt};
pub use locks::AggregateLocks;
pub use phase::{PhaseTracker, ReconcilePhase};
