use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::game::{Difficulty, GameType, RawAnswerEvent, MAX_ATTEMPTS_PER_ITEM};
use crate::stats::{ratio, round3, GameState};
use crate::storage::UserId;

/// Round budget and per-item attempt limit of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// `None` plays until the user quits or solves the puzzle
    pub max_rounds: Option<u32>,
    pub max_attempts_per_item: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_rounds: Some(10),
            max_attempts_per_item: MAX_ATTEMPTS_PER_ITEM,
        }
    }
}

impl SessionConfig {
    pub fn open_ended() -> Self {
        Self {
            max_rounds: None,
            ..Self::default()
        }
    }

    /// Sudoku and memory run until solved or quit; the rest use the round budget
    pub fn for_game(game_type: GameType) -> Self {
        match game_type {
            GameType::Sudoku | GameType::Memory => Self::open_ended(),
            GameType::Math | GameType::Reaction | GameType::Trivia => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Init,
    InProgress,
    RoundComplete,
    SessionOver,
    SummaryShown,
}

impl SessionPhase {
    pub fn accepts_answers(&self) -> bool {
        matches!(self, SessionPhase::InProgress | SessionPhase::RoundComplete)
    }

    pub fn is_over(&self) -> bool {
        matches!(self, SessionPhase::SessionOver | SessionPhase::SummaryShown)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Init => "init",
            SessionPhase::InProgress => "in_progress",
            SessionPhase::RoundComplete => "round_complete",
            SessionPhase::SessionOver => "session_over",
            SessionPhase::SummaryShown => "summary_shown",
        };
        f.write_str(name)
    }
}

/// Everything a session counts. Replaced as a unit, never reset field by field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub rounds_completed: u32,
    /// Items finished, solved or failed
    pub questions_answered: u32,
    /// Items solved within the attempt limit
    pub correct_answers: u32,
    pub total_score: u32,
    /// Every submitted answer, retries included
    pub attempts_submitted: u32,
    pub total_elapsed_ms: u64,
    /// Wrong answers so far on the current item
    pub current_item_attempts: u8,
}

impl SessionCounters {
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            rounds_completed: self.rounds_completed,
            questions_answered: self.questions_answered,
            score: self.total_score,
            accuracy: ratio(
                u64::from(self.correct_answers),
                u64::from(self.questions_answered),
            ),
            average_reaction_ms: self.average_reaction_ms(),
        }
    }

    pub fn average_reaction_ms(&self) -> f64 {
        if self.attempts_submitted == 0 {
            0.0
        } else {
            round3(self.total_elapsed_ms as f64 / f64::from(self.attempts_submitted))
        }
    }
}

/// Display stats derived purely from counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub rounds_completed: u32,
    pub questions_answered: u32,
    pub score: u32,
    pub accuracy: f64,
    pub average_reaction_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub accuracy: f64,
    pub total_score: u32,
    pub elapsed_time_ms: u64,
    pub average_reaction_ms: f64,
}

impl From<&SessionCounters> for SessionSummary {
    fn from(counters: &SessionCounters) -> Self {
        Self {
            questions_answered: counters.questions_answered,
            correct_answers: counters.correct_answers,
            accuracy: ratio(
                u64::from(counters.correct_answers),
                u64::from(counters.questions_answered),
            ),
            total_score: counters.total_score,
            elapsed_time_ms: counters.total_elapsed_ms,
            average_reaction_ms: counters.average_reaction_ms(),
        }
    }
}

/// One play-through of a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: Uuid,
    pub user_id: UserId,
    pub game_type: GameType,
    pub config: SessionConfig,
    pub phase: SessionPhase,
    pub counters: SessionCounters,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl GameSession {
    pub fn new(
        user_id: UserId,
        game_type: GameType,
        config: SessionConfig,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            game_type,
            config,
            phase: SessionPhase::Init,
            counters: SessionCounters::default(),
            created_at,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            session_id: self.id,
            game_type: self.game_type,
            config: self.config,
        }
    }

    pub fn round_budget_reached(&self) -> bool {
        self.config
            .max_rounds
            .is_some_and(|max_rounds| self.counters.rounds_completed >= max_rounds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub game_type: GameType,
    pub config: SessionConfig,
}

/// One answer as reported by the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerInput {
    /// Topic as the game reports it; the game's adapter derives the category
    #[serde(alias = "topic")]
    pub category: String,
    pub difficulty: Difficulty,
    pub correct: bool,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub question_id: Option<String>,
    #[serde(default)]
    pub user_answer: Option<String>,
}

impl AnswerInput {
    pub fn into_event(self, attempt_number: u8) -> RawAnswerEvent {
        RawAnswerEvent {
            question_id: self.question_id,
            topic: self.category,
            difficulty: self.difficulty,
            correct: self.correct,
            elapsed_ms: self.elapsed_ms,
            attempt_number,
            user_answer: self.user_answer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoundOutcome {
    /// Wrong answer with attempts left on the same item
    RetryItem {
        attempts_remaining: u8,
        stats: SessionStats,
    },
    /// The item is finished and the next round may start
    RoundComplete {
        solved: bool,
        score: u32,
        stats: SessionStats,
        game_state: Option<GameState>,
    },
    /// The item finished the session
    SessionOver {
        solved: bool,
        score: u32,
        stats: SessionStats,
        game_state: Option<GameState>,
    },
}
