use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedMutexGuard, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    errors::SessionError,
    models::{
        AnswerInput, GameSession, RoundOutcome, SessionConfig, SessionCounters, SessionHandle,
        SessionPhase, SessionSummary,
    },
    repository::SessionRepository,
    view::StateMirror,
};
use crate::clock::Clock;
use crate::event::{EngineEvent, UserSubscription};
use crate::game::{GameAdapter, GameType, StandardGameAdapter};
use crate::reconcile::{AggregateLocks, ReconcileError, ReconciliationController};
use crate::stats::GameState;
use crate::storage::UserId;

/// Drives game sessions and feeds their answers to the reconciliation controller.
///
/// Calls on one session are serialized; each one replaces the stored session record as a whole.
pub struct SessionService {
    controller: ReconciliationController,
    repository: Arc<dyn SessionRepository>,
    locks: AggregateLocks,
    clock: Arc<dyn Clock>,
    default_config: SessionConfig,
    /// user_id -> mirror of published game states
    mirrors: RwLock<HashMap<UserId, Arc<StateMirror>>>,
}

impl SessionService {
    pub fn new(
        controller: ReconciliationController,
        repository: Arc<dyn SessionRepository>,
        default_config: SessionConfig,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            clock: controller.clock(),
            controller,
            repository,
            locks: AggregateLocks::new(lock_timeout),
            default_config,
            mirrors: RwLock::new(HashMap::new()),
        }
    }

    /// Config used when the caller does not supply one
    pub fn config_for(&self, game_type: GameType) -> SessionConfig {
        match SessionConfig::for_game(game_type).max_rounds {
            Some(_) => self.default_config,
            None => SessionConfig {
                max_rounds: None,
                ..self.default_config
            },
        }
    }

    async fn lock_session(&self, session_id: Uuid) -> Result<OwnedMutexGuard<()>, SessionError> {
        Ok(self.locks.acquire(&session_lock_key(session_id)).await?)
    }

    /// Loads a session owned by the user. Other users' sessions read as not found.
    async fn load(&self, user_id: &UserId, session_id: Uuid) -> Result<GameSession, SessionError> {
        match self.repository.get_session(session_id).await? {
            Some(session) if &session.user_id == user_id => Ok(session),
            Some(_) => {
                warn!(session_id = %session_id, "Session belongs to another user");
                Err(SessionError::NotFound(session_id))
            }
            None => Err(SessionError::NotFound(session_id)),
        }
    }

    async fn ensure_mirror(&self, user_id: &UserId) {
        if self.mirrors.read().await.contains_key(user_id) {
            return;
        }

        let mut mirrors = self.mirrors.write().await;
        if mirrors.contains_key(user_id) {
            return;
        }
        let mirror = Arc::new(StateMirror::new());
        UserSubscription::new(
            user_id.clone(),
            mirror.clone(),
            self.controller.event_bus().clone(),
        )
        .start()
        .await;
        mirrors.insert(user_id.clone(), mirror);
        debug!(user_id = %user_id, "State mirror subscribed");
    }

    /// Creates a session in the Init phase
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn start_session(
        &self,
        user_id: &UserId,
        game_type: GameType,
        config: Option<SessionConfig>,
    ) -> Result<SessionHandle, SessionError> {
        let config = config.unwrap_or_else(|| self.config_for(game_type));
        let session = GameSession::new(user_id.clone(), game_type, config, self.clock.now());

        self.repository.create_session(&session).await?;
        self.ensure_mirror(user_id).await;

        info!(session_id = %session.id, max_rounds = ?config.max_rounds, "Session created");
        Ok(session.handle())
    }

    /// Resets every counter in one replacement and enters InProgress
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn start_new_session(
        &self,
        user_id: &UserId,
        session_id: Uuid,
    ) -> Result<SessionHandle, SessionError> {
        let _guard = self.lock_session(session_id).await?;
        let session = self.load(user_id, session_id).await?;

        let restarted = GameSession {
            phase: SessionPhase::InProgress,
            counters: SessionCounters::default(),
            started_at: Some(self.clock.now()),
            ended_at: None,
            ..session
        };
        self.repository.replace_session(&restarted).await?;

        info!(session_id = %session_id, "Session started");
        Ok(restarted.handle())
    }

    /// Applies one answer. Awaits reconciliation before the round advances.
    #[instrument(skip(self, user_id, answer), fields(user_id = %user_id, correct = answer.correct))]
    pub async fn submit_answer(
        &self,
        user_id: &UserId,
        session_id: Uuid,
        answer: AnswerInput,
    ) -> Result<RoundOutcome, SessionError> {
        let _guard = self.lock_session(session_id).await?;
        let mut session = self.load(user_id, session_id).await?;
        if !session.phase.accepts_answers() {
            return Err(SessionError::InvalidTransition {
                from: session.phase,
                action: "answer in",
            });
        }

        let attempt_number = session.counters.current_item_attempts.saturating_add(1);
        let attempt = StandardGameAdapter::for_game(session.game_type)
            .extract_attempt(&answer.into_event(attempt_number))?
            .with_session_id(session_id);

        let mut counters = session.counters;
        counters.attempts_submitted += 1;
        counters.total_elapsed_ms += u64::from(attempt.elapsed_time_ms);

        let max_attempts = session.config.max_attempts_per_item.max(1);
        if !attempt.correct && attempt_number < max_attempts {
            tolerate(self.controller.record_history(user_id, &attempt).await)?;

            counters.current_item_attempts = attempt_number;
            session.counters = counters;
            session.phase = SessionPhase::InProgress;
            self.repository.replace_session(&session).await?;

            debug!(attempt_number, "Wrong answer, item stays open");
            return Ok(RoundOutcome::RetryItem {
                attempts_remaining: max_attempts - attempt_number,
                stats: counters.stats(),
            });
        }

        let game_state = tolerate(self.controller.submit_attempt(user_id, attempt.clone()).await)?
            .map(|reconciled| reconciled.game_state);

        counters.questions_answered += 1;
        counters.rounds_completed += 1;
        counters.current_item_attempts = 0;
        if attempt.correct {
            counters.correct_answers += 1;
            counters.total_score += attempt.score;
        }
        session.counters = counters;

        if session.round_budget_reached() {
            self.finish(&mut session).await?;
            return Ok(RoundOutcome::SessionOver {
                solved: attempt.correct,
                score: attempt.score,
                stats: counters.stats(),
                game_state,
            });
        }

        session.phase = SessionPhase::RoundComplete;
        self.repository.replace_session(&session).await?;
        debug!(
            rounds_completed = counters.rounds_completed,
            solved = attempt.correct,
            "Round complete"
        );
        Ok(RoundOutcome::RoundComplete {
            solved: attempt.correct,
            score: attempt.score,
            stats: counters.stats(),
            game_state,
        })
    }

    /// Ends an open-ended puzzle session as solved
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn mark_solved(
        &self,
        user_id: &UserId,
        session_id: Uuid,
    ) -> Result<SessionSummary, SessionError> {
        let _guard = self.lock_session(session_id).await?;
        let mut session = self.load(user_id, session_id).await?;
        if !session.phase.accepts_answers() {
            return Err(SessionError::InvalidTransition {
                from: session.phase,
                action: "solve",
            });
        }

        self.finish(&mut session).await?;
        Ok(SessionSummary::from(&session.counters))
    }

    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn quit(
        &self,
        user_id: &UserId,
        session_id: Uuid,
    ) -> Result<SessionSummary, SessionError> {
        let _guard = self.lock_session(session_id).await?;
        let mut session = self.load(user_id, session_id).await?;
        if session.phase.is_over() {
            return Err(SessionError::InvalidTransition {
                from: session.phase,
                action: "quit",
            });
        }

        self.finish(&mut session).await?;
        Ok(SessionSummary::from(&session.counters))
    }

    /// Summary of the session; from SessionOver this moves it to SummaryShown
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn get_session_summary(
        &self,
        user_id: &UserId,
        session_id: Uuid,
    ) -> Result<SessionSummary, SessionError> {
        let _guard = self.lock_session(session_id).await?;
        let mut session = self.load(user_id, session_id).await?;

        if session.phase == SessionPhase::SessionOver {
            session.phase = SessionPhase::SummaryShown;
            self.repository.replace_session(&session).await?;
            debug!("Summary shown");
        }
        Ok(SessionSummary::from(&session.counters))
    }

    pub async fn session(
        &self,
        user_id: &UserId,
        session_id: Uuid,
    ) -> Result<GameSession, SessionError> {
        self.load(user_id, session_id).await
    }

    /// Latest game state published to this user, as seen by the session's mirror
    pub async fn latest_state(&self, user_id: &UserId, game_type: GameType) -> Option<GameState> {
        let mirror = self.mirrors.read().await.get(user_id).cloned()?;
        mirror.latest(game_type).await
    }

    /// Deletes sessions that ended more than `retention` ago and frees their locks.
    /// Users left without sessions lose their mirror and event channel.
    #[instrument(skip(self))]
    pub async fn sweep_ended_sessions(
        &self,
        retention: chrono::Duration,
    ) -> Result<usize, SessionError> {
        let cutoff = self.clock.now() - retention;
        let ended = self.repository.ended_sessions(cutoff).await?;
        if ended.is_empty() {
            debug!("No ended sessions to sweep");
            return Ok(0);
        }

        let mut deleted = 0;
        let mut users = HashSet::new();
        for candidate in ended {
            let guard = match self.lock_session(candidate.id).await {
                Ok(guard) => guard,
                Err(e) => {
                    warn!(session_id = %candidate.id, error = %e, "Session busy, sweep skipped");
                    continue;
                }
            };
            // A restart may have reopened it since the scan
            let still_ended = match self.repository.get_session(candidate.id).await? {
                Some(current) => {
                    current.phase.is_over() && current.ended_at.is_some_and(|at| at <= cutoff)
                }
                None => false,
            };
            if still_ended {
                self.repository.delete_session(candidate.id).await?;
                deleted += 1;
                users.insert(candidate.user_id);
                debug!(session_id = %candidate.id, "Ended session deleted");
            }
            drop(guard);
            self.locks.release(&session_lock_key(candidate.id)).await;
        }

        for user_id in users {
            self.release_user_if_idle(&user_id).await?;
        }

        info!(deleted, "Ended sessions swept");
        Ok(deleted)
    }

    /// Drops the mirror and event channel of a user with no sessions left, which ends
    /// the mirror's subscription task. Holds the mirror map so a concurrent start re-subscribes.
    async fn release_user_if_idle(&self, user_id: &UserId) -> Result<(), SessionError> {
        let mut mirrors = self.mirrors.write().await;
        if self.repository.user_has_sessions(user_id).await? {
            return Ok(());
        }
        if mirrors.remove(user_id).is_some() {
            self.controller.event_bus().remove_user(user_id).await;
            debug!(user_id = %user_id, "State mirror released");
        }
        Ok(())
    }

    pub async fn mirror_count(&self) -> usize {
        self.mirrors.read().await.len()
    }

    pub async fn session_lock_count(&self) -> usize {
        self.locks.lock_count().await
    }

    async fn finish(&self, session: &mut GameSession) -> Result<(), SessionError> {
        session.phase = SessionPhase::SessionOver;
        session.ended_at = Some(self.clock.now());
        self.repository.replace_session(session).await?;

        let summary = SessionSummary::from(&session.counters);
        info!(
            session_id = %session.id,
            questions_answered = summary.questions_answered,
            total_score = summary.total_score,
            "Session over"
        );
        self.controller
            .event_bus()
            .emit_to_user(
                &session.user_id,
                EngineEvent::SessionEnded {
                    user_id: session.user_id.clone(),
                    session_id: session.id,
                    game_type: session.game_type,
                    summary,
                },
            )
            .await;
        Ok(())
    }
}

fn session_lock_key(session_id: Uuid) -> String {
    format!("SESSION#{}", session_id)
}

/// Storage and internal failures are logged and the session carries on;
/// validation errors and lock conflicts reach the caller.
fn tolerate<T>(result: Result<T, ReconcileError>) -> Result<Option<T>, SessionError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ (ReconcileError::Validation(_) | ReconcileError::ConcurrencyConflict { .. })) => {
            Err(SessionError::Reconcile(e))
        }
        Err(e) => {
            warn!(error = %e, "Reconciliation failed, session continues");
            Ok(None)
        }
    }
}
