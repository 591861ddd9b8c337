pub mod keys;
pub mod repository;
pub mod state_store;

mod errors;

pub use errors::StorageError;
pub use keys::{
    epoch_sort_key, AggregateKey, EmbeddingKey, HistoryKey, ItemKey, PartitionKey, QueryOptions,
    StatsKey, UserId, KEY_SEPARATOR,
};
pub use repository::{InMemoryKeyValueStore, KeyValueStore, PostgresKeyValueStore, StoredItem};
pub use state_store::{StateStore, StoreResult, WriteBatch};
