use std::collections::HashMap;
use tokio::sync::RwLock;

/// Load state of one cached aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum CacheSlot<T> {
    NotLoaded,
    Loading,
    Ready(T),
}

/// Aggregate cache keyed by partition key. Values are only ever replaced whole.
#[derive(Debug)]
pub struct StateCache<T> {
    slots: RwLock<HashMap<String, CacheSlot<T>>>,
}

impl<T> Default for StateCache<T> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Clone> StateCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn slot(&self, key: &str) -> CacheSlot<T> {
        self.slots
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or(CacheSlot::NotLoaded)
    }

    /// Marks a slot as loading unless it already holds a value
    pub async fn begin_load(&self, key: &str) {
        let mut slots = self.slots.write().await;
        let slot = slots.entry(key.to_string()).or_insert(CacheSlot::NotLoaded);
        if !matches!(slot, CacheSlot::Ready(_)) {
            *slot = CacheSlot::Loading;
        }
    }

    /// Returns a slot stuck in `Loading` to `NotLoaded` after a failed read
    pub async fn abandon_load(&self, key: &str) {
        let mut slots = self.slots.write().await;
        if matches!(slots.get(key), Some(CacheSlot::Loading)) {
            slots.remove(key);
        }
    }

    pub async fn publish(&self, key: &str, value: T) {
        self.slots
            .write()
            .await
            .insert(key.to_string(), CacheSlot::Ready(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slot_lifecycle() {
        let cache: StateCache<u32> = StateCache::new();
        assert_eq!(cache.slot("k").await, CacheSlot::NotLoaded);

        cache.begin_load("k").await;
        assert_eq!(cache.slot("k").await, CacheSlot::Loading);

        cache.abandon_load("k").await;
        assert_eq!(cache.slot("k").await, CacheSlot::NotLoaded);

        cache.publish("k", 7).await;
        cache.begin_load("k").await;
        assert_eq!(cache.slot("k").await, CacheSlot::Ready(7));

        cache.publish("k", 8).await;
        assert_eq!(cache.slot("k").await, CacheSlot::Ready(8));
    }
}
