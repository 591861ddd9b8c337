use futures::future::join;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use super::{
    cache::{CacheSlot, StateCache},
    locks::AggregateLocks,
    phase::{PhaseTracker, ReconcilePhase},
    ReconcileError,
};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::event::{EngineEvent, EventBus};
use crate::game::{normalize_category, Attempt, Difficulty, GameType};
use crate::prediction::{
    predict_difficulty, ModelCallPolicy, ModelVariant, OfflinePredictionModel, PredictionError,
    PredictionModel,
};
use crate::retry::RetryPolicy;
use crate::stats::{
    advance_streak, bucket_key, build_feature_vector, prepare_game_state, update_category_totals,
    update_frequency_bucket, CategoryState, Frequency, GameHistoryRecord, GameState, Streak,
    UserStatistics,
};
use crate::storage::{
    epoch_sort_key, state_store::history_item_key, AggregateKey, EmbeddingKey, ItemKey,
    KeyValueStore, PartitionKey, StateStore, StatsKey, UserId, WriteBatch,
};

/// Result of one reconciled attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledState {
    pub game_state: GameState,
    pub category_state: CategoryState,
    /// Overall statistics record after this attempt
    pub statistics: UserStatistics,
    pub phases: Vec<ReconcilePhase>,
    /// The primary model gave no usable answer; the prior prediction was kept
    pub primary_fallback: bool,
    /// The target model gave no usable answer; the prior target was kept
    pub target_fallback: bool,
}

struct ControllerInner {
    store: StateStore,
    model: Arc<dyn PredictionModel>,
    clock: Arc<dyn Clock>,
    locks: AggregateLocks,
    game_cache: StateCache<GameState>,
    category_cache: StateCache<CategoryState>,
    event_bus: EventBus,
    model_policy: ModelCallPolicy,
}

/// Turns attempts into persisted, published aggregate state.
///
/// Writers for one (user, game type) are serialized by a per-aggregate lock; the
/// user's statistics lock is always taken second.
#[derive(Clone)]
pub struct ReconciliationController {
    inner: Arc<ControllerInner>,
}

impl ReconciliationController {
    pub fn builder(store: Arc<dyn KeyValueStore>) -> ReconciliationControllerBuilder {
        ReconciliationControllerBuilder::new(store)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    /// Reconciles one attempt. Once the writer locks are held the work runs in its
    /// own task, so dropping the returned future does not cancel it.
    #[instrument(skip(self, user_id, attempt), fields(user_id = %user_id, game_type = %attempt.game_type))]
    pub async fn submit_attempt(
        &self,
        user_id: &UserId,
        mut attempt: Attempt,
    ) -> Result<ReconciledState, ReconcileError> {
        attempt.category = normalize_category(&attempt.category);
        attempt.validate()?;

        let game_key = AggregateKey::game(user_id, attempt.game_type);
        let game_guard = self.inner.locks.acquire(&game_key.partition_key()).await?;
        let stats_key = StatsKey::new(user_id, Frequency::Overall);
        let stats_guard = self.inner.locks.acquire(&stats_key.partition_key()).await?;

        let inner = Arc::clone(&self.inner);
        let user_id = user_id.clone();
        let task = tokio::spawn(async move {
            let result = inner.reconcile(&user_id, attempt).await;
            drop(stats_guard);
            drop(game_guard);
            result
        });

        task.await.map_err(|e| {
            error!(error = %e, "Reconciliation task aborted");
            ReconcileError::Internal(e.to_string())
        })?
    }

    /// Appends a history record without touching aggregates
    #[instrument(skip(self, user_id, attempt), fields(user_id = %user_id, game_type = %attempt.game_type))]
    pub async fn record_history(
        &self,
        user_id: &UserId,
        attempt: &Attempt,
    ) -> Result<(), ReconcileError> {
        attempt.validate()?;
        let record = GameHistoryRecord {
            attempt: attempt.clone(),
            recorded_at: self.inner.clock.now().timestamp_millis(),
        };
        self.inner.store.append_history(user_id, &record).await?;
        Ok(())
    }

    pub async fn history(&self, user_id: &UserId) -> Result<Vec<GameHistoryRecord>, ReconcileError> {
        Ok(self.inner.store.history(user_id).await?)
    }

    /// Latest game state, from the cache when loaded. Storage reads here never fill the cache.
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn current_state(
        &self,
        user_id: &UserId,
        game_type: GameType,
    ) -> Result<Option<GameState>, ReconcileError> {
        let key = AggregateKey::game(user_id, game_type);
        if let CacheSlot::Ready(state) = self.inner.game_cache.slot(&key.partition_key()).await {
            debug!("Serving game state from cache");
            return Ok(Some(state));
        }
        Ok(self.inner.store.latest_game_state(&key).await?)
    }
}

fn resolve_prediction(
    variant: ModelVariant,
    outcome: Result<Difficulty, PredictionError>,
    prior: Option<Difficulty>,
) -> (Option<Difficulty>, bool) {
    match outcome {
        Ok(difficulty) => (Some(difficulty), false),
        Err(e) => {
            warn!(
                variant = %variant,
                error = %e,
                fallback = ?prior,
                "Model prediction unavailable; keeping prior value"
            );
            (prior, true)
        }
    }
}

impl ControllerInner {
    async fn reconcile(
        &self,
        user_id: &UserId,
        attempt: Attempt,
    ) -> Result<ReconciledState, ReconcileError> {
        let mut phases = PhaseTracker::new();
        match self.run(&mut phases, user_id, &attempt).await {
            Ok(state) => {
                info!(
                    user_id = %user_id,
                    game_type = %attempt.game_type,
                    total_questions = state.game_state.total_questions,
                    "Attempt reconciled"
                );
                Ok(state)
            }
            Err(e) => {
                phases.fail();
                error!(
                    user_id = %user_id,
                    game_type = %attempt.game_type,
                    phase_trace = ?phases.trace(),
                    error = %e,
                    "Reconciliation failed"
                );
                self.event_bus
                    .emit_to_user(
                        user_id,
                        EngineEvent::ReconcileFailed {
                            user_id: user_id.clone(),
                            game_type: attempt.game_type,
                            reason: e.to_string(),
                        },
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        phases: &mut PhaseTracker,
        user_id: &UserId,
        attempt: &Attempt,
    ) -> Result<ReconciledState, ReconcileError> {
        phases.advance(ReconcilePhase::Aggregating)?;
        let game_type = attempt.game_type;
        let game_key = AggregateKey::game(user_id, game_type);
        let category_key = AggregateKey::category(user_id, game_type, &attempt.category);

        let prior_game = self.load_game_state(&game_key).await?;
        let prior_category = self.load_category_state(&category_key, &attempt.category).await?;

        let now_secs = self.clock.now().timestamp();
        let today = self.clock.today();

        let mut category_state = update_category_totals(&prior_category, attempt)?;
        category_state.created_at = now_secs.max(prior_category.created_at + 1);
        let draft = prepare_game_state(attempt, &prior_game, &category_state)?;

        let daily_bucket = bucket_key(Frequency::Daily, today);
        let weekly_bucket = bucket_key(Frequency::Weekly, today);
        let prior_overall = self
            .store
            .latest_statistics(&StatsKey::new(user_id, Frequency::Overall))
            .await?;
        let prior_daily = self
            .store
            .latest_statistics(&StatsKey::new(user_id, Frequency::Daily))
            .await?;
        let prior_weekly = self
            .store
            .latest_statistics(&StatsKey::new(user_id, Frequency::Weekly))
            .await?;

        let streak = advance_streak(
            prior_overall
                .as_ref()
                .map(|stats| Streak {
                    current: stats.current_streak,
                    longest: stats.longest_streak,
                })
                .unwrap_or_default(),
            prior_overall.as_ref().and_then(UserStatistics::bucket_date),
            today,
        );

        let mut buckets = Vec::with_capacity(3);
        for (frequency, bucket, prior) in [
            (Frequency::Daily, &daily_bucket, prior_daily.as_ref()),
            (Frequency::Weekly, &weekly_bucket, prior_weekly.as_ref()),
            (Frequency::Overall, &daily_bucket, prior_overall.as_ref()),
        ] {
            let mut stats = update_frequency_bucket(frequency, bucket, prior, game_type, attempt)?;
            stats.current_streak = streak.current;
            stats.longest_streak = streak.longest;
            stats.updated_at = now_secs;
            buckets.push(stats);
        }
        let overall = buckets
            .last()
            .cloned()
            .ok_or_else(|| ReconcileError::Internal("overall bucket missing".to_string()))?;

        let mut draft = draft;
        draft.user_embedding = overall.user_embedding();
        let vector = build_feature_vector(&draft, &draft.user_embedding, game_type);

        phases.advance(ReconcilePhase::ModelPrimaryPending)?;
        let primary = predict_difficulty(
            self.model.as_ref(),
            &vector,
            ModelVariant::Primary,
            &self.model_policy,
        );
        phases.advance(ReconcilePhase::ModelTargetPending)?;
        let target = predict_difficulty(
            self.model.as_ref(),
            &vector,
            ModelVariant::Target,
            &self.model_policy,
        );
        let (primary, target) = join(primary, target).await;

        phases.advance(ReconcilePhase::Merging)?;
        let (predicted_difficulty, primary_fallback) =
            resolve_prediction(ModelVariant::Primary, primary, prior_game.predicted_difficulty);
        let (target_difficulty, target_fallback) =
            resolve_prediction(ModelVariant::Target, target, prior_game.target_difficulty);

        let game_state = GameState {
            predicted_difficulty,
            target_difficulty,
            created_at: now_secs.max(prior_game.created_at + 1),
            ..draft
        };

        phases.advance(ReconcilePhase::Persisting)?;
        let history = GameHistoryRecord {
            attempt: attempt.clone(),
            recorded_at: self.clock.now().timestamp_millis(),
        };

        let mut batch = WriteBatch::new();
        batch.put(
            ItemKey::new(&game_key, epoch_sort_key(game_state.created_at)),
            &game_state,
        )?;
        batch.put(
            ItemKey::new(&category_key, epoch_sort_key(category_state.created_at)),
            &category_state,
        )?;
        for stats in &buckets {
            batch.put(
                ItemKey::new(&StatsKey::new(user_id, stats.frequency), stats.bucket.clone()),
                stats,
            )?;
        }
        batch.put(
            ItemKey::partition_only(&EmbeddingKey {
                user_id: user_id.clone(),
            }),
            &game_state.user_embedding,
        )?;
        batch.put(history_item_key(user_id, &history), &history)?;
        self.store.commit(batch).await?;

        self.game_cache
            .publish(&game_key.partition_key(), game_state.clone())
            .await;
        self.category_cache
            .publish(&category_key.partition_key(), category_state.clone())
            .await;
        self.event_bus
            .emit_to_user(
                user_id,
                EngineEvent::StateReconciled {
                    user_id: user_id.clone(),
                    game_state: game_state.clone(),
                    category_state: category_state.clone(),
                },
            )
            .await;

        phases.advance(ReconcilePhase::Complete)?;
        Ok(ReconciledState {
            game_state,
            category_state,
            statistics: overall,
            phases: phases.trace().to_vec(),
            primary_fallback,
            target_fallback,
        })
    }

    async fn load_game_state(&self, key: &AggregateKey) -> Result<GameState, ReconcileError> {
        let partition_key = key.partition_key();
        if let CacheSlot::Ready(state) = self.game_cache.slot(&partition_key).await {
            return Ok(state);
        }

        self.game_cache.begin_load(&partition_key).await;
        match self.store.latest_game_state(key).await {
            Ok(found) => {
                let state = found.unwrap_or_else(|| GameState::empty(key.game_type));
                self.game_cache.publish(&partition_key, state.clone()).await;
                Ok(state)
            }
            Err(failure) => {
                self.game_cache.abandon_load(&partition_key).await;
                Err(failure.into())
            }
        }
    }

    async fn load_category_state(
        &self,
        key: &AggregateKey,
        category: &str,
    ) -> Result<CategoryState, ReconcileError> {
        let partition_key = key.partition_key();
        if let CacheSlot::Ready(state) = self.category_cache.slot(&partition_key).await {
            return Ok(state);
        }

        self.category_cache.begin_load(&partition_key).await;
        match self.store.latest_category_state(key).await {
            Ok(found) => {
                let state = found.unwrap_or_else(|| CategoryState::empty(category));
                self.category_cache
                    .publish(&partition_key, state.clone())
                    .await;
                Ok(state)
            }
            Err(failure) => {
                self.category_cache.abandon_load(&partition_key).await;
                Err(failure.into())
            }
        }
    }
}

pub struct ReconciliationControllerBuilder {
    store: Arc<dyn KeyValueStore>,
    model: Arc<dyn PredictionModel>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    lock_timeout: Duration,
    model_policy: ModelCallPolicy,
    storage_retry: RetryPolicy,
}

impl ReconciliationControllerBuilder {
    fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let defaults = EngineConfig::default();
        Self {
            store,
            model: Arc::new(OfflinePredictionModel),
            clock: Arc::new(SystemClock),
            event_bus: None,
            lock_timeout: defaults.lock_timeout,
            model_policy: defaults.model_policy,
            storage_retry: defaults.storage_retry,
        }
    }

    /// Takes lock timeout and retry policies from `config`
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.lock_timeout = config.lock_timeout;
        self.model_policy = config.model_policy.clone();
        self.storage_retry = config.storage_retry.clone();
        self
    }

    pub fn with_model(mut self, model: Arc<dyn PredictionModel>) -> Self {
        self.model = model;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_model_policy(mut self, policy: ModelCallPolicy) -> Self {
        self.model_policy = policy;
        self
    }

    pub fn with_storage_retry(mut self, retry: RetryPolicy) -> Self {
        self.storage_retry = retry;
        self
    }

    pub fn build(self) -> ReconciliationController {
        ReconciliationController {
            inner: Arc::new(ControllerInner {
                store: StateStore::new(self.store, self.storage_retry),
                model: self.model,
                clock: self.clock,
                locks: AggregateLocks::new(self.lock_timeout),
                game_cache: StateCache::new(),
                category_cache: StateCache::new(),
                event_bus: self.event_bus.unwrap_or_default(),
                model_policy: self.model_policy,
            }),
        }
    }
}
