use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::GameType;
use crate::stats::Frequency;

/// Separates the segments of a partition key; no segment may contain it
pub const KEY_SEPARATOR: char = '#';

/// Opaque user identity supplied by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Returns `None` for a blank id or one containing the key separator
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains(KEY_SEPARATOR) {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything stored under a single partition
pub trait PartitionKey {
    fn partition_key(&self) -> String;
}

/// Identity of one GameState stream (no category) or one CategoryState stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateKey {
    pub user_id: UserId,
    pub game_type: GameType,
    pub category: Option<String>,
}

impl AggregateKey {
    pub fn game(user_id: &UserId, game_type: GameType) -> Self {
        Self {
            user_id: user_id.clone(),
            game_type,
            category: None,
        }
    }

    pub fn category(user_id: &UserId, game_type: GameType, category: &str) -> Self {
        Self {
            user_id: user_id.clone(),
            game_type,
            category: Some(category.to_string()),
        }
    }
}

impl PartitionKey for AggregateKey {
    fn partition_key(&self) -> String {
        let game = self.game_type.as_str().to_uppercase();
        match &self.category {
            Some(category) => format!("{}#{}#{}", game, category.to_uppercase(), self.user_id),
            None => format!("{}#{}", game, self.user_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatsKey {
    pub user_id: UserId,
    pub frequency: Frequency,
}

impl StatsKey {
    pub fn new(user_id: &UserId, frequency: Frequency) -> Self {
        Self {
            user_id: user_id.clone(),
            frequency,
        }
    }
}

impl PartitionKey for StatsKey {
    fn partition_key(&self) -> String {
        let prefix = match self.frequency {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Overall => "STATS",
        };
        format!("{}#{}", prefix, self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryKey {
    pub user_id: UserId,
}

impl PartitionKey for HistoryKey {
    fn partition_key(&self) -> String {
        format!("UGHX#{}", self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmbeddingKey {
    pub user_id: UserId,
}

impl PartitionKey for EmbeddingKey {
    fn partition_key(&self) -> String {
        format!("USER#{}", self.user_id)
    }
}

/// Full address of one stored item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub partition_key: String,
    pub sort_key: Option<String>,
}

impl ItemKey {
    pub fn new(partition: &impl PartitionKey, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition.partition_key(),
            sort_key: Some(sort_key.into()),
        }
    }

    pub fn partition_only(partition: &impl PartitionKey) -> Self {
        Self {
            partition_key: partition.partition_key(),
            sort_key: None,
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sort_key {
            Some(sort_key) => write!(f, "{}/{}", self.partition_key, sort_key),
            None => f.write_str(&self.partition_key),
        }
    }
}

/// Sort key for epoch-second versions; zero padded so text order matches time order
pub fn epoch_sort_key(epoch_secs: i64) -> String {
    format!("{:012}", epoch_secs.max(0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub scan_forward: bool,
    pub limit: Option<usize>,
}

impl QueryOptions {
    pub fn latest() -> Self {
        Self {
            scan_forward: false,
            limit: Some(1),
        }
    }

    pub fn all() -> Self {
        Self {
            scan_forward: true,
            limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::parse("u-42").unwrap()
    }

    #[test]
    fn aggregate_keys_uppercase_game_and_category() {
        let game = AggregateKey::game(&user(), GameType::Math);
        assert_eq!(game.partition_key(), "MATH#u-42");

        let category = AggregateKey::category(&user(), GameType::Trivia, "1980s pop");
        assert_eq!(category.partition_key(), "TRIVIA#1980S POP#u-42");
    }

    #[test]
    fn stats_history_and_embedding_prefixes() {
        assert_eq!(
            StatsKey::new(&user(), Frequency::Daily).partition_key(),
            "DAILY#u-42"
        );
        assert_eq!(
            StatsKey::new(&user(), Frequency::Weekly).partition_key(),
            "WEEKLY#u-42"
        );
        assert_eq!(
            StatsKey::new(&user(), Frequency::Overall).partition_key(),
            "STATS#u-42"
        );
        assert_eq!(HistoryKey { user_id: user() }.partition_key(), "UGHX#u-42");
        assert_eq!(EmbeddingKey { user_id: user() }.partition_key(), "USER#u-42");
    }

    #[test]
    fn blank_user_ids_are_rejected() {
        assert!(UserId::parse("   ").is_none());
        assert_eq!(UserId::parse(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn user_ids_with_separator_are_rejected() {
        assert!(UserId::parse("SUB#u1").is_none());
        assert!(UserId::parse("#").is_none());
    }

    #[test]
    fn game_and_category_partitions_stay_apart() {
        let u1 = UserId::parse("u1").unwrap();
        let category = AggregateKey::category(&u1, GameType::Math, "sub");
        let games: Vec<String> = ["sub", "SUB", "u1"]
            .iter()
            .filter_map(|raw| UserId::parse(raw))
            .map(|user| AggregateKey::game(&user, GameType::Math).partition_key())
            .collect();
        assert!(!games.contains(&category.partition_key()));
    }

    #[test]
    fn epoch_sort_keys_order_lexically() {
        assert!(epoch_sort_key(999) < epoch_sort_key(1_000));
        assert_eq!(epoch_sort_key(1_740_787_200), "001740787200");
    }
}
