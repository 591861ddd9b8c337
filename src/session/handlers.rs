use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::models::{AnswerInput, RoundOutcome, SessionConfig, SessionHandle, SessionSummary};
use crate::game::GameType;
use crate::shared::{AppError, AppState};
use crate::storage::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub game_type: GameType,
    #[serde(default)]
    pub config: Option<SessionConfig>,
}

/// POST /sessions
///
/// Creates a session in the Init phase
#[instrument(name = "create_session", skip(state, user_id, request), fields(user_id = %user_id))]
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<SessionHandle>, AppError> {
    info!(game_type = %request.game_type, "Creating session");
    let handle = state
        .sessions
        .start_session(&user_id, request.game_type, request.config)
        .await?;
    Ok(Json(handle))
}

/// POST /sessions/:id/start
#[instrument(name = "start_new_session", skip(state, user_id), fields(user_id = %user_id))]
pub async fn start_new_session(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionHandle>, AppError> {
    Ok(Json(
        state.sessions.start_new_session(&user_id, session_id).await?,
    ))
}

/// POST /sessions/:id/answers
#[instrument(name = "submit_answer", skip(state, user_id, answer), fields(user_id = %user_id))]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(session_id): Path<Uuid>,
    Json(answer): Json<AnswerInput>,
) -> Result<Json<RoundOutcome>, AppError> {
    Ok(Json(
        state
            .sessions
            .submit_answer(&user_id, session_id, answer)
            .await?,
    ))
}

/// POST /sessions/:id/solve
#[instrument(name = "mark_solved", skip(state, user_id), fields(user_id = %user_id))]
pub async fn mark_solved(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    Ok(Json(state.sessions.mark_solved(&user_id, session_id).await?))
}

/// POST /sessions/:id/quit
#[instrument(name = "quit_session", skip(state, user_id), fields(user_id = %user_id))]
pub async fn quit_session(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    Ok(Json(state.sessions.quit(&user_id, session_id).await?))
}

/// GET /sessions/:id/summary
#[instrument(name = "session_summary", skip(state, user_id), fields(user_id = %user_id))]
pub async fn session_summary(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    Ok(Json(
        state
            .sessions
            .get_session_summary(&user_id, session_id)
            .await?,
    ))
}
