use serde::{Deserialize, Serialize};

use super::{
    attempt::Attempt,
    types::{Difficulty, GameType},
};
use crate::stats::StatsError;

/// Raw answer event as a game front end reports it, before normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAnswerEvent {
    pub question_id: Option<String>,
    /// Game-specific topic: scenario type, decade, image file, puzzle id
    pub topic: String,
    pub difficulty: Difficulty,
    pub correct: bool,
    pub elapsed_ms: u64,
    pub attempt_number: u8,
    pub user_answer: Option<String>,
}

/// Capability every game implements to feed the engine
pub trait GameAdapter: Send + Sync {
    fn game_type(&self) -> GameType;

    fn extract_attempt(&self, event: &RawAnswerEvent) -> Result<Attempt, StatsError>;
}

type CategoryFn = fn(&str) -> String;

/// Adapter parameterized by game type and a category extraction function
pub struct StandardGameAdapter {
    game_type: GameType,
    category_of: CategoryFn,
}

impl StandardGameAdapter {
    pub fn new(game_type: GameType, category_of: CategoryFn) -> Self {
        Self {
            game_type,
            category_of,
        }
    }

    /// The default adapter for a game, with that game's category convention
    pub fn for_game(game_type: GameType) -> Self {
        let category_of: CategoryFn = match game_type {
            GameType::Reaction | GameType::Memory => strip_extension,
            GameType::Math | GameType::Trivia | GameType::Sudoku => trimmed,
        };
        Self::new(game_type, category_of)
    }
}

fn trimmed(topic: &str) -> String {
    topic.trim().to_string()
}

/// Image-based games use the file name without extension as the category
fn strip_extension(topic: &str) -> String {
    let topic = topic.trim();
    match topic.rfind('.') {
        Some(idx) if idx > 0 => topic[..idx].to_string(),
        _ => topic.to_string(),
    }
}

impl GameAdapter for StandardGameAdapter {
    fn game_type(&self) -> GameType {
        self.game_type
    }

    fn extract_attempt(&self, event: &RawAnswerEvent) -> Result<Attempt, StatsError> {
        let category = (self.category_of)(&event.topic);
        let mut attempt = Attempt::new(
            self.game_type,
            category,
            event.difficulty,
            event.correct,
            event.elapsed_ms,
            event.attempt_number,
        )?;
        attempt.question_id = event.question_id.clone();
        attempt.user_answer = event.user_answer.clone();
        Ok(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(topic: &str) -> RawAnswerEvent {
        RawAnswerEvent {
            question_id: Some("q1".to_string()),
            topic: topic.to_string(),
            difficulty: Difficulty::Medium,
            correct: true,
            elapsed_ms: 800,
            attempt_number: 2,
            user_answer: None,
        }
    }

    #[test]
    fn reaction_adapter_uses_image_stem_as_category() {
        let adapter = StandardGameAdapter::for_game(GameType::Reaction);
        let attempt = adapter.extract_attempt(&event("forest_04.jpg")).unwrap();

        assert_eq!(attempt.category, "forest_04");
        assert_eq!(attempt.game_type, GameType::Reaction);
        assert_eq!(attempt.score, 30);
    }

    #[test]
    fn math_adapter_keeps_scenario_name() {
        let adapter = StandardGameAdapter::for_game(GameType::Math);
        let attempt = adapter.extract_attempt(&event(" pizza.party ")).unwrap();
        assert_eq!(attempt.category, "pizza.party");
    }

    #[test]
    fn empty_topic_is_a_validation_error() {
        let adapter = StandardGameAdapter::for_game(GameType::Trivia);
        let result = adapter.extract_attempt(&event("   "));
        assert!(matches!(result, Err(StatsError::Validation(_))));
    }
}
