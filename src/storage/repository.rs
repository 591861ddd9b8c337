use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, PgPool, Row};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::{
    keys::{ItemKey, QueryOptions},
    StorageError,
};

/// A stored item together with its address
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub key: ItemKey,
    pub item: Value,
}

/// Partition/sort-key document store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &ItemKey) -> Result<Option<Value>, StorageError>;

    async fn put(&self, key: &ItemKey, item: Value) -> Result<(), StorageError>;

    /// Shallow-merges the top-level fields of `partial` into the item, creating it if absent
    async fn update(&self, key: &ItemKey, partial: Value) -> Result<Value, StorageError>;

    async fn query(
        &self,
        partition_key: &str,
        options: QueryOptions,
    ) -> Result<Vec<StoredItem>, StorageError>;

    /// Writes every item or none of them
    async fn transact_put(&self, items: Vec<(ItemKey, Value)>) -> Result<(), StorageError>;
}

fn merge_fields(existing: Option<Value>, partial: Value) -> Result<Value, StorageError> {
    let Value::Object(fields) = partial else {
        return Err(StorageError::Serialization(
            "partial update must be a JSON object".to_string(),
        ));
    };

    let mut merged = match existing {
        Some(Value::Object(current)) => current,
        Some(_) => {
            return Err(StorageError::Serialization(
                "stored item is not a JSON object".to_string(),
            ))
        }
        None => serde_json::Map::new(),
    };
    merged.extend(fields);
    Ok(Value::Object(merged))
}

fn sort_key_column(key: &ItemKey) -> &str {
    key.sort_key.as_deref().unwrap_or("")
}

fn from_sort_key_column(partition_key: String, sort_key: String) -> ItemKey {
    ItemKey {
        partition_key,
        sort_key: if sort_key.is_empty() {
            None
        } else {
            Some(sort_key)
        },
    }
}

type Partition = BTreeMap<String, Value>;

/// In-memory store for development and tests; data is lost on restart
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    partitions: RwLock<BTreeMap<String, Partition>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items under one partition
    pub async fn item_count(&self, partition_key: &str) -> usize {
        self.partitions
            .read()
            .await
            .get(partition_key)
            .map(|partition| partition.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn get(&self, key: &ItemKey) -> Result<Option<Value>, StorageError> {
        let partitions = self.partitions.read().await;
        let item = partitions
            .get(&key.partition_key)
            .and_then(|partition| partition.get(sort_key_column(key)))
            .cloned();
        debug!(found = item.is_some(), "Fetched item from memory");
        Ok(item)
    }

    #[instrument(skip(self, key, item), fields(key = %key))]
    async fn put(&self, key: &ItemKey, item: Value) -> Result<(), StorageError> {
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(key.partition_key.clone())
            .or_default()
            .insert(sort_key_column(key).to_string(), item);
        debug!("Stored item in memory");
        Ok(())
    }

    #[instrument(skip(self, key, partial), fields(key = %key))]
    async fn update(&self, key: &ItemKey, partial: Value) -> Result<Value, StorageError> {
        let mut partitions = self.partitions.write().await;
        let partition = partitions.entry(key.partition_key.clone()).or_default();
        let merged = merge_fields(partition.get(sort_key_column(key)).cloned(), partial)?;
        partition.insert(sort_key_column(key).to_string(), merged.clone());
        debug!("Updated item in memory");
        Ok(merged)
    }

    #[instrument(skip(self))]
    async fn query(
        &self,
        partition_key: &str,
        options: QueryOptions,
    ) -> Result<Vec<StoredItem>, StorageError> {
        let partitions = self.partitions.read().await;
        let Some(partition) = partitions.get(partition_key) else {
            return Ok(Vec::new());
        };

        let to_item = |(sort_key, item): (&String, &Value)| StoredItem {
            key: from_sort_key_column(partition_key.to_string(), sort_key.clone()),
            item: item.clone(),
        };
        let limit = options.limit.unwrap_or(usize::MAX);
        let items: Vec<StoredItem> = if options.scan_forward {
            partition.iter().take(limit).map(to_item).collect()
        } else {
            partition.iter().rev().take(limit).map(to_item).collect()
        };

        debug!(count = items.len(), "Queried partition in memory");
        Ok(items)
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn transact_put(&self, items: Vec<(ItemKey, Value)>) -> Result<(), StorageError> {
        let mut partitions = self.partitions.write().await;
        for (key, item) in items {
            partitions
                .entry(key.partition_key.clone())
                .or_default()
                .insert(sort_key_column(&key).to_string(), item);
        }
        debug!("Committed batch in memory");
        Ok(())
    }
}

/// PostgreSQL store over a single `kv_items` table
pub struct PostgresKeyValueStore {
    pool: PgPool,
}

impl PostgresKeyValueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_items (
                partition_key TEXT NOT NULL,
                sort_key TEXT NOT NULL DEFAULT '',
                item JSONB NOT NULL,
                PRIMARY KEY (partition_key, sort_key)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create kv_items table");
            StorageError::from(e)
        })?;
        Ok(())
    }
}

const UPSERT_SQL: &str = "INSERT INTO kv_items (partition_key, sort_key, item) VALUES ($1, $2, $3)
     ON CONFLICT (partition_key, sort_key) DO UPDATE SET item = EXCLUDED.item";

#[async_trait]
impl KeyValueStore for PostgresKeyValueStore {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn get(&self, key: &ItemKey) -> Result<Option<Value>, StorageError> {
        let row = sqlx::query(
            "SELECT item FROM kv_items WHERE partition_key = $1 AND sort_key = $2",
        )
        .bind(&key.partition_key)
        .bind(sort_key_column(key))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch item from database");
            StorageError::from(e)
        })?;

        row.map(|row| row.try_get::<Json<Value>, _>("item").map(|json| json.0))
            .transpose()
            .map_err(StorageError::from)
    }

    #[instrument(skip(self, key, item), fields(key = %key))]
    async fn put(&self, key: &ItemKey, item: Value) -> Result<(), StorageError> {
        sqlx::query(UPSERT_SQL)
            .bind(&key.partition_key)
            .bind(sort_key_column(key))
            .bind(Json(item))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to store item in database");
                StorageError::from(e)
            })?;
        debug!("Stored item in database");
        Ok(())
    }

    #[instrument(skip(self, key, partial), fields(key = %key))]
    async fn update(&self, key: &ItemKey, partial: Value) -> Result<Value, StorageError> {
        if !partial.is_object() {
            return Err(StorageError::Serialization(
                "partial update must be a JSON object".to_string(),
            ));
        }

        let row = sqlx::query(
            "INSERT INTO kv_items (partition_key, sort_key, item) VALUES ($1, $2, $3)
             ON CONFLICT (partition_key, sort_key) DO UPDATE SET item = kv_items.item || EXCLUDED.item
             RETURNING item",
        )
        .bind(&key.partition_key)
        .bind(sort_key_column(key))
        .bind(Json(partial))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to update item in database");
            StorageError::from(e)
        })?;

        let merged: Json<Value> = row.try_get("item")?;
        Ok(merged.0)
    }

    #[instrument(skip(self))]
    async fn query(
        &self,
        partition_key: &str,
        options: QueryOptions,
    ) -> Result<Vec<StoredItem>, StorageError> {
        let sql = if options.scan_forward {
            "SELECT partition_key, sort_key, item FROM kv_items WHERE partition_key = $1
             ORDER BY sort_key ASC LIMIT $2"
        } else {
            "SELECT partition_key, sort_key, item FROM kv_items WHERE partition_key = $1
             ORDER BY sort_key DESC LIMIT $2"
        };
        let limit = options
            .limit
            .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX))
            .unwrap_or(i64::MAX);

        let rows = sqlx::query(sql)
            .bind(partition_key)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to query partition in database");
                StorageError::from(e)
            })?;

        rows.into_iter()
            .map(|row| {
                let item: Json<Value> = row.try_get("item")?;
                Ok(StoredItem {
                    key: from_sort_key_column(row.try_get("partition_key")?, row.try_get("sort_key")?),
                    item: item.0,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StorageError::from)
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn transact_put(&self, items: Vec<(ItemKey, Value)>) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        for (key, item) in items {
            sqlx::query(UPSERT_SQL)
                .bind(&key.partition_key)
                .bind(sort_key_column(&key))
                .bind(Json(item))
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    warn!(error = %e, key = %key, "Failed to write batch item; rolling back");
                    StorageError::from(e)
                })?;
        }
        tx.commit().await?;
        debug!("Committed batch in database");
        Ok(())
    }
}
