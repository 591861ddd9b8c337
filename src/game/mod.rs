pub mod adapter;
pub mod attempt;
pub mod types;

pub use adapter::{GameAdapter, RawAnswerEvent, StandardGameAdapter};
pub use attempt::{
    clamp_elapsed_ms, normalize_category, score_for_attempt, Attempt, AttemptSubmission, MAX_ATTEMPTS_PER_ITEM,
    MAX_ELAPSED_MS,
};
pub use types::{Difficulty, GameType};
