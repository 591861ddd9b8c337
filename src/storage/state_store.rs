use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    keys::{
        AggregateKey, HistoryKey, ItemKey, PartitionKey, QueryOptions, StatsKey,
        UserId,
    },
    repository::KeyValueStore,
    StorageError,
};
use crate::retry::{with_retry, RetryFailure, RetryPolicy};
use crate::stats::{CategoryState, GameHistoryRecord, GameState, UserStatistics};

pub type StoreResult<T> = Result<T, RetryFailure<StorageError>>;

/// Items written together in one transaction
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    items: Vec<(ItemKey, Value)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: ItemKey, item: &impl Serialize) -> Result<(), StorageError> {
        self.items.push((key, serde_json::to_value(item)?));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Typed reads and writes of engine records, retried under the storage policy
#[derive(Clone)]
pub struct StateStore {
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
}

impl StateStore {
    pub fn new(store: Arc<dyn KeyValueStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    async fn latest<T: DeserializeOwned>(&self, partition: &impl PartitionKey) -> StoreResult<Option<T>> {
        let partition_key = partition.partition_key();
        let items = with_retry(&self.retry, "storage.query", || {
            self.store.query(&partition_key, QueryOptions::latest())
        })
        .await?;

        items
            .into_iter()
            .next()
            .map(|stored| serde_json::from_value(stored.item))
            .transpose()
            .map_err(|e| RetryFailure {
                attempts: 1,
                error: StorageError::from(e),
            })
    }

    #[instrument(skip(self, key), fields(partition_key = %key.partition_key()))]
    pub async fn latest_game_state(&self, key: &AggregateKey) -> StoreResult<Option<GameState>> {
        let state = self.latest(key).await?;
        debug!(found = state.is_some(), "Loaded latest game state");
        Ok(state)
    }

    #[instrument(skip(self, key), fields(partition_key = %key.partition_key()))]
    pub async fn latest_category_state(
        &self,
        key: &AggregateKey,
    ) -> StoreResult<Option<CategoryState>> {
        let state = self.latest(key).await?;
        debug!(found = state.is_some(), "Loaded latest category state");
        Ok(state)
    }

    #[instrument(skip(self, key), fields(partition_key = %key.partition_key()))]
    pub async fn latest_statistics(&self, key: &StatsKey) -> StoreResult<Option<UserStatistics>> {
        self.latest(key).await
    }

    /// History records of a user, oldest first
    pub async fn history(&self, user_id: &UserId) -> StoreResult<Vec<GameHistoryRecord>> {
        let partition_key = HistoryKey {
            user_id: user_id.clone(),
        }
        .partition_key();
        let items = with_retry(&self.retry, "storage.query", || {
            self.store.query(&partition_key, QueryOptions::all())
        })
        .await?;

        items
            .into_iter()
            .map(|stored| serde_json::from_value(stored.item))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RetryFailure {
                attempts: 1,
                error: StorageError::from(e),
            })
    }

    #[instrument(skip(self, record), fields(user_id = %user_id))]
    pub async fn append_history(
        &self,
        user_id: &UserId,
        record: &GameHistoryRecord,
    ) -> StoreResult<ItemKey> {
        let key = history_item_key(user_id, record);
        let item = serde_json::to_value(record).map_err(|e| RetryFailure {
            attempts: 1,
            error: StorageError::from(e),
        })?;

        with_retry(&self.retry, "storage.put", || {
            self.store.put(&key, item.clone())
        })
        .await?;
        debug!(key = %key, "Appended history record");
        Ok(key)
    }

    #[instrument(skip(self, batch), fields(items = batch.len()))]
    pub async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        with_retry(&self.retry, "storage.transact_put", || {
            self.store.transact_put(batch.items.clone())
        })
        .await
    }
}

/// History sort keys are unique per record so concurrent appends never collide
pub fn history_item_key(user_id: &UserId, record: &GameHistoryRecord) -> ItemKey {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    ItemKey::new(
        &HistoryKey {
            user_id: user_id.clone(),
        },
        format!("{:015}#{}", record.recorded_at.max(0), &suffix[..8]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Attempt, Difficulty, GameType};
    use crate::storage::{keys::epoch_sort_key, InMemoryKeyValueStore};
    use crate::stats::Frequency;

    fn store() -> StateStore {
        StateStore::new(
            Arc::new(InMemoryKeyValueStore::new()),
            RetryPolicy::no_retry(),
        )
    }

    fn user() -> UserId {
        UserId::parse("u1").unwrap()
    }

    #[tokio::test]
    async fn latest_game_state_picks_newest_version() {
        let store = store();
        let key = AggregateKey::game(&user(), GameType::Math);

        let mut batch = WriteBatch::new();
        for (created_at, total) in [(100, 1), (300, 3), (200, 2)] {
            let mut state = GameState::empty(GameType::Math);
            state.created_at = created_at;
            state.total_questions = total;
            batch
                .put(ItemKey::new(&key, epoch_sort_key(created_at)), &state)
                .unwrap();
        }
        store.commit(batch).await.unwrap();

        let latest = store.latest_game_state(&key).await.unwrap().unwrap();
        assert_eq!(latest.total_questions, 3);
        assert!(store
            .latest_game_state(&AggregateKey::game(&user(), GameType::Trivia))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn latest_statistics_reads_bucket() {
        let store = store();
        let key = StatsKey::new(&user(), Frequency::Daily);
        let stats = UserStatistics::empty(Frequency::Daily, "20250301");

        let mut batch = WriteBatch::new();
        batch.put(ItemKey::new(&key, "20250301"), &stats).unwrap();
        store.commit(batch).await.unwrap();

        assert_eq!(store.latest_statistics(&key).await.unwrap(), Some(stats));
    }

    #[tokio::test]
    async fn history_appends_do_not_overwrite() {
        let store = store();
        let attempt = Attempt::new(GameType::Math, "add", Difficulty::Easy, false, 900, 1).unwrap();
        let record = GameHistoryRecord {
            attempt,
            recorded_at: 1_740_787_200_000,
        };

        store.append_history(&user(), &record).await.unwrap();
        store.append_history(&user(), &record).await.unwrap();

        let history = store.history(&user()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], record);
    }

    #[tokio::test]
    async fn malformed_item_is_a_serialization_error() {
        let backend = Arc::new(InMemoryKeyValueStore::new());
        let store = StateStore::new(backend.clone(), RetryPolicy::no_retry());
        let key = AggregateKey::game(&user(), GameType::Math);
        backend
            .put(&ItemKey::new(&key, "1"), serde_json::json!({"nope": true}))
            .await
            .unwrap();

        let failure = store.latest_game_state(&key).await.unwrap_err();
        assert!(matches!(failure.error, StorageError::Serialization(_)));
    }
}
