#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

use neurobeacon::{
    event::{EngineEvent, EngineEventHandler, EventError},
    prediction::{ModelVariant, PredictionError, PredictionModel},
    stats::FeatureVector,
    storage::{InMemoryKeyValueStore, ItemKey, KeyValueStore, QueryOptions, StorageError, StoredItem},
    UserId,
};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Prediction model with fixed answers per variant that counts its calls
pub struct MockPredictionModel {
    primary: Result<Option<i64>, PredictionError>,
    target: Result<Option<i64>, PredictionError>,
    calls: AtomicU32,
}

impl MockPredictionModel {
    pub fn answering(primary: i64, target: i64) -> Self {
        Self {
            primary: Ok(Some(primary)),
            target: Ok(Some(target)),
            calls: AtomicU32::new(0),
        }
    }

    pub fn unavailable() -> Self {
        let error = PredictionError::Unavailable("503 from model".to_string());
        Self {
            primary: Err(error.clone()),
            target: Err(error),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PredictionModel for MockPredictionModel {
    async fn predict(
        &self,
        _vector: &FeatureVector,
        variant: ModelVariant,
    ) -> Result<Option<i64>, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match variant {
            ModelVariant::Primary => self.primary.clone(),
            ModelVariant::Target => self.target.clone(),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// In-memory store whose first `failures` writes fail transiently
pub struct FlakyKeyValueStore {
    inner: InMemoryKeyValueStore,
    failures: u32,
    writes: AtomicU32,
}

impl FlakyKeyValueStore {
    pub fn failing_first(failures: u32) -> Self {
        Self {
            inner: InMemoryKeyValueStore::new(),
            failures,
            writes: AtomicU32::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(u32::MAX)
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn item_count(&self, partition_key: &str) -> usize {
        self.inner.item_count(partition_key).await
    }

    fn check_write(&self) -> Result<(), StorageError> {
        let attempt = self.writes.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            Err(StorageError::Transient("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyKeyValueStore {
    async fn get(&self, key: &ItemKey) -> Result<Option<Value>, StorageError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &ItemKey, item: Value) -> Result<(), StorageError> {
        self.check_write()?;
        self.inner.put(key, item).await
    }

    async fn update(&self, key: &ItemKey, partial: Value) -> Result<Value, StorageError> {
        self.check_write()?;
        self.inner.update(key, partial).await
    }

    async fn query(
        &self,
        partition_key: &str,
        options: QueryOptions,
    ) -> Result<Vec<StoredItem>, StorageError> {
        self.inner.query(partition_key, options).await
    }

    async fn transact_put(&self, items: Vec<(ItemKey, Value)>) -> Result<(), StorageError> {
        self.check_write()?;
        self.inner.transact_put(items).await
    }
}

/// Event handler that keeps every event it receives
#[derive(Default)]
pub struct RecordingHandler {
    events: RwLock<Vec<EngineEvent>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<EngineEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl EngineEventHandler for RecordingHandler {
    async fn handle_event(&self, _user_id: &UserId, event: EngineEvent) -> Result<(), EventError> {
        self.events.write().await.push(event);
        Ok(())
    }

    fn handler_name(&self) -> &'static str {
        "RecordingHandler"
    }
}
