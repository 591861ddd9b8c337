use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{Difficulty, GameType};
use crate::stats::StatsError;
use crate::storage::KEY_SEPARATOR;

/// Elapsed times are stored as 32-bit signed values downstream
pub const MAX_ELAPSED_MS: u32 = i32::MAX as u32;

/// Wrong answers allowed on one item before it is marked failed
pub const MAX_ATTEMPTS_PER_ITEM: u8 = 3;

/// Canonical form of a category: trimmed and lower-cased, so "Sub" and " sub" fold together
pub fn normalize_category(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn clamp_elapsed_ms(raw_ms: u64) -> u32 {
    raw_ms.min(MAX_ELAPSED_MS as u64) as u32
}

/// Score for a correct answer on the given attempt: 100%, 50%, 25%, then nothing
pub fn score_for_attempt(difficulty: Difficulty, attempt_number: u8) -> u32 {
    let base = difficulty.base_score();
    match attempt_number {
        1 => base,
        2 => base / 2,
        3 => base / 4,
        _ => 0,
    }
}

/// One answer submission for a single question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub game_type: GameType,
    pub category: String,
    pub difficulty: Difficulty,
    pub correct: bool,
    pub elapsed_time_ms: u32,
    pub attempt_number: u8,
    pub score: u32,
    pub question_id: Option<String>,
    pub session_id: Option<Uuid>,
    pub user_answer: Option<String>,
}

impl Attempt {
    /// Builds an attempt with the score derived from difficulty and attempt number
    pub fn new(
        game_type: GameType,
        category: impl Into<String>,
        difficulty: Difficulty,
        correct: bool,
        elapsed_ms: u64,
        attempt_number: u8,
    ) -> Result<Self, StatsError> {
        let score = if correct {
            score_for_attempt(difficulty, attempt_number)
        } else {
            0
        };

        let attempt = Self {
            game_type,
            category: normalize_category(&category.into()),
            difficulty,
            correct,
            elapsed_time_ms: clamp_elapsed_ms(elapsed_ms),
            attempt_number,
            score,
            question_id: None,
            session_id: None,
            user_answer: None,
        };
        attempt.validate()?;
        Ok(attempt)
    }

    pub fn with_score(mut self, score: u32) -> Self {
        self.score = score;
        self
    }

    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn validate(&self) -> Result<(), StatsError> {
        if self.category.trim().is_empty() {
            return Err(StatsError::Validation(
                "attempt category cannot be empty".to_string(),
            ));
        }
        if self.category.contains(KEY_SEPARATOR) {
            return Err(StatsError::Validation(format!(
                "attempt category cannot contain '{}'",
                KEY_SEPARATOR
            )));
        }
        if self.attempt_number == 0 {
            return Err(StatsError::Validation(
                "attempt number starts at 1".to_string(),
            ));
        }
        if self.elapsed_time_ms > MAX_ELAPSED_MS {
            return Err(StatsError::Validation(format!(
                "elapsed time {} exceeds {}",
                self.elapsed_time_ms, MAX_ELAPSED_MS
            )));
        }
        Ok(())
    }
}

/// Wire shape of an attempt as posted by a game client; every field may be missing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptSubmission {
    pub game_type: Option<GameType>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub correct: Option<bool>,
    pub elapsed_time_ms: Option<u64>,
    pub attempt_number: Option<u8>,
    pub score: Option<u32>,
    pub question_id: Option<String>,
    pub session_id: Option<Uuid>,
    pub user_answer: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, StatsError> {
    value.ok_or_else(|| StatsError::Validation(format!("{} is required", field)))
}

impl TryFrom<AttemptSubmission> for Attempt {
    type Error = StatsError;

    fn try_from(submission: AttemptSubmission) -> Result<Self, Self::Error> {
        let mut attempt = Attempt::new(
            required(submission.game_type, "game_type")?,
            required(submission.category, "category")?,
            required(submission.difficulty, "difficulty")?,
            required(submission.correct, "correct")?,
            required(submission.elapsed_time_ms, "elapsed_time_ms")?,
            submission.attempt_number.unwrap_or(1),
        )?;

        if let Some(score) = submission.score {
            attempt = attempt.with_score(score);
        }
        attempt.question_id = submission.question_id;
        attempt.session_id = submission.session_id;
        attempt.user_answer = submission.user_answer;
        Ok(attempt)
    }
}
