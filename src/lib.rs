// Library crate for the adaptive-difficulty engine
// This file exposes the public API for integration tests

pub mod clock;
pub mod config;
pub mod event;
pub mod game;
pub mod prediction;
pub mod reconcile;
pub mod retry;
pub mod session;
pub mod shared;
pub mod stats;
pub mod storage;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

// Re-export commonly used types for easier access in tests
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use event::{EngineEvent, EventBus, UserSubscription};
pub use game::{Attempt, Difficulty, GameType};
pub use reconcile::{ReconcileError, ReconciledState, ReconciliationController};
pub use session::{SessionConfig, SessionService};
pub use shared::{AppError, AppState};
pub use storage::{InMemoryKeyValueStore, KeyValueStore, UserId};

/// Every route, behind the user identity middleware
pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/attempts", post(reconcile::submit_attempt))
        .route("/state/:game_type", get(reconcile::current_state))
        .route("/sessions", post(session::create_session))
        .route("/sessions/:id/start", post(session::start_new_session))
        .route("/sessions/:id/answers", post(session::submit_answer))
        .route("/sessions/:id/solve", post(session::mark_solved))
        .route("/sessions/:id/quit", post(session::quit_session))
        .route("/sessions/:id/summary", get(session::session_summary))
        .layer(middleware::from_fn(session::user_identity))
        .with_state(app_state)
}
