use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

use super::ReconcileError;

/// Single-writer locks keyed by storage partition key
#[derive(Debug, Clone)]
pub struct AggregateLocks {
    mutexes: Arc<RwLock<HashMap<String, Arc<AsyncMutex<()>>>>>,
    timeout: Duration,
}

impl AggregateLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            mutexes: Arc::new(RwLock::new(HashMap::new())),
            timeout,
        }
    }

    async fn mutex_for(&self, partition_key: &str) -> Arc<AsyncMutex<()>> {
        {
            let guard = self.mutexes.read().await;
            if let Some(lock) = guard.get(partition_key) {
                return lock.clone();
            }
        }

        let mut guard = self.mutexes.write().await;
        guard
            .entry(partition_key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drops the mutex for a key nobody holds or waits on; returns whether it was removed
    pub async fn release(&self, partition_key: &str) -> bool {
        let mut guard = self.mutexes.write().await;
        match guard.get(partition_key) {
            Some(lock) if Arc::strong_count(lock) == 1 => {
                guard.remove(partition_key);
                debug!(partition_key, "Writer lock released");
                true
            }
            _ => false,
        }
    }

    pub async fn lock_count(&self) -> usize {
        self.mutexes.read().await.len()
    }

    /// Waits up to the configured timeout. The guard is owned so it can move into a spawned task.
    pub async fn acquire(&self, partition_key: &str) -> Result<OwnedMutexGuard<()>, ReconcileError> {
        let mutex = self.mutex_for(partition_key).await;
        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                debug!(partition_key, "Writer lock acquired");
                Ok(guard)
            }
            Err(_) => {
                warn!(
                    partition_key,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Timed out waiting for writer lock"
                );
                Err(ReconcileError::ConcurrencyConflict {
                    key: partition_key.to_string(),
                })
            }
        }
    }
}
