use crate::game::{Difficulty, GameType};

/// Weight in {1,2,3}. Correct answers weigh more the harder the question;
/// misses weigh more the easier the question.
pub fn calculate_reward_weight(difficulty: Difficulty, is_correct: bool) -> u8 {
    match (is_correct, difficulty) {
        (true, Difficulty::Hard) => 3,
        (true, Difficulty::Medium) => 2,
        (true, Difficulty::Easy) => 1,
        (false, Difficulty::Hard) => 1,
        (false, Difficulty::Medium) => 2,
        (false, Difficulty::Easy) => 3,
    }
}

pub fn calculate_reward(weight: u8, is_correct: bool) -> u8 {
    weight * u8::from(is_correct)
}

pub fn calculate_is_slow(game_type: GameType, elapsed_ms: u32) -> bool {
    elapsed_ms > game_type.slow_threshold_ms()
}
