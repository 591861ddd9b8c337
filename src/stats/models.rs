use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::game::{Attempt, Difficulty, GameType};

/// Rounds to three decimal places, the precision every stored ratio uses
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// `numerator / denominator` rounded to 3 dp, 0 when the denominator is 0
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round3(numerator as f64 / denominator as f64)
    }
}

/// Question/correct counters with the derived percentage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTotals {
    pub total_questions: u64,
    pub total_correct: u64,
    pub percent_correct: f64,
}

impl PerformanceTotals {
    pub fn record(&self, correct: bool) -> Self {
        let total_questions = self.total_questions + 1;
        let total_correct = self.total_correct + u64::from(correct);
        Self {
            total_questions,
            total_correct,
            percent_correct: ratio(total_correct, total_questions),
        }
    }
}

/// Rolling totals for one category within one game
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryState {
    pub category: String,
    pub total_questions: u64,
    pub total_correct: u64,
    pub percent_correct: f64,
    pub created_at: i64,
}

impl CategoryState {
    pub fn empty(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }
}

/// Long-run correctness per difficulty, fed to the model as user features
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UserEmbedding {
    pub easy_percent: f64,
    pub medium_percent: f64,
    pub hard_percent: f64,
}

impl UserEmbedding {
    pub fn as_array(&self) -> [f64; 3] {
        [self.easy_percent, self.medium_percent, self.hard_percent]
    }
}

/// Cumulative per-user, per-game aggregate of performance and reward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub game_type: GameType,
    pub prev_is_slow: bool,
    pub prev_is_correct: bool,
    pub total_questions: u64,
    pub total_correct: u64,
    pub percent_correct: f64,
    pub total_elapsed_time_ms: u64,
    pub average_user_time_ms: f64,
    pub reward_weight: u8,
    pub reward: u8,
    pub reward_weight_cumulative: u64,
    pub reward_cumulative: u64,
    pub total_weighted_reward: f64,
    pub score: u32,
    pub difficulty: Difficulty,
    pub predicted_difficulty: Option<Difficulty>,
    pub target_difficulty: Option<Difficulty>,
    pub category: CategoryState,
    pub user_embedding: UserEmbedding,
    /// Epoch seconds; doubles as the storage sort key of this version
    pub created_at: i64,
}

impl GameState {
    /// State of a user who has never played this game
    pub fn empty(game_type: GameType) -> Self {
        Self {
            game_type,
            prev_is_slow: false,
            prev_is_correct: false,
            total_questions: 0,
            total_correct: 0,
            percent_correct: 0.0,
            total_elapsed_time_ms: 0,
            average_user_time_ms: 0.0,
            reward_weight: 0,
            reward: 0,
            reward_weight_cumulative: 0,
            reward_cumulative: 0,
            total_weighted_reward: 0.0,
            score: 0,
            difficulty: Difficulty::default(),
            predicted_difficulty: None,
            target_difficulty: None,
            category: CategoryState::default(),
            user_embedding: UserEmbedding::default(),
            created_at: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Overall,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Frequency::Daily => "daily",
                Frequency::Weekly => "weekly",
                Frequency::Overall => "overall",
            }
        )
    }
}

/// Statistics for one frequency bucket (a day, a week, or the running overall record)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatistics {
    pub frequency: Frequency,
    /// yyyymmdd; week start for weekly buckets, last active day for the overall record
    pub bucket: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total: PerformanceTotals,
    pub games: BTreeMap<GameType, PerformanceTotals>,
    pub difficulties: BTreeMap<Difficulty, PerformanceTotals>,
    pub updated_at: i64,
}

impl UserStatistics {
    pub fn empty(frequency: Frequency, bucket: impl Into<String>) -> Self {
        Self {
            frequency,
            bucket: bucket.into(),
            current_streak: 0,
            longest_streak: 0,
            total: PerformanceTotals::default(),
            games: BTreeMap::new(),
            difficulties: BTreeMap::new(),
            updated_at: 0,
        }
    }

    pub fn game(&self, game_type: GameType) -> PerformanceTotals {
        self.games.get(&game_type).cloned().unwrap_or_default()
    }

    pub fn difficulty(&self, difficulty: Difficulty) -> PerformanceTotals {
        self.difficulties
            .get(&difficulty)
            .cloned()
            .unwrap_or_default()
    }

    pub fn user_embedding(&self) -> UserEmbedding {
        UserEmbedding {
            easy_percent: self.difficulty(Difficulty::Easy).percent_correct,
            medium_percent: self.difficulty(Difficulty::Medium).percent_correct,
            hard_percent: self.difficulty(Difficulty::Hard).percent_correct,
        }
    }

    pub fn bucket_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.bucket, "%Y%m%d").ok()
    }
}

/// Append-only log entry, one per attempt including failed intermediate ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameHistoryRecord {
    #[serde(flatten)]
    pub attempt: Attempt,
    /// Epoch milliseconds
    pub recorded_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_guards_zero_denominator() {
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(ratio(2, 3), 0.667);
        assert_eq!(ratio(1, 1), 1.0);
    }

    #[test]
    fn totals_record_correct_and_incorrect() {
        let totals = PerformanceTotals::default().record(true).record(false);
        assert_eq!(totals.total_questions, 2);
        assert_eq!(totals.total_correct, 1);
        assert_eq!(totals.percent_correct, 0.5);
    }

    #[test]
    fn statistics_serialize_enum_keyed_maps() {
        let mut stats = UserStatistics::empty(Frequency::Daily, "20250301");
        stats
            .games
            .insert(GameType::Math, PerformanceTotals::default().record(true));

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["games"]["math"]["total_questions"], 1);

        let back: UserStatistics = serde_json::from_value(json).unwrap();
        assert_eq!(back, stats);
        assert_eq!(
            back.bucket_date(),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }
}
