// Public API - what other modules can use
pub use cleanup_task::{start_cleanup_task, CleanupConfig};
pub use errors::SessionError;
pub use handlers::{
    create_session, mark_solved, quit_session, session_summary, start_new_session, submit_answer,
    StartSessionRequest,
};
pub use middleware::{user_identity, USER_ID_HEADER};
pub use models::{
    AnswerInput, GameSession, RoundOutcome, SessionConfig, SessionCounters, SessionHandle,
    SessionPhase, SessionStats, SessionSummary,
};
pub use repository::{InMemorySessionRepository, SessionRepository};
pub use service::SessionService;
pub use view::StateMirror;

// Internal modules
pub mod cleanup_task;
mod errors;
mod handlers;
mod middleware;
pub mod models;
pub mod repository;
pub mod service;
pub mod view;
