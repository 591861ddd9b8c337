use axum::{
    extract::{Path, State},
    Extension, Json,
};
use tracing::{info, instrument};

use super::controller::ReconciledState;
use crate::game::{Attempt, AttemptSubmission, GameType};
use crate::shared::{AppError, AppState};
use crate::stats::{GameState, StatsError};
use crate::storage::UserId;

/// POST /attempts
///
/// Reconciles one attempt and returns the persisted state
#[instrument(name = "submit_attempt", skip(state, user_id, submission), fields(user_id = %user_id))]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Json(submission): Json<AttemptSubmission>,
) -> Result<Json<ReconciledState>, AppError> {
    let attempt = Attempt::try_from(submission)?;
    info!(game_type = %attempt.game_type, correct = attempt.correct, "Submitting attempt");

    let reconciled = state.controller.submit_attempt(&user_id, attempt).await?;
    Ok(Json(reconciled))
}

/// GET /state/:game_type
#[instrument(name = "current_state", skip(state, user_id), fields(user_id = %user_id))]
pub async fn current_state(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(game_type): Path<String>,
) -> Result<Json<GameState>, AppError> {
    let game_type = GameType::try_from(game_type.as_str())
        .map_err(|raw| StatsError::Validation(format!("unknown game type {}", raw)))?;

    state
        .controller
        .current_state(&user_id, game_type)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no {} state for user", game_type)))
}
