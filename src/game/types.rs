use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::EnumIter;

/// The five mini-games that feed the engine
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Math,
    Memory,
    Reaction,
    Sudoku,
    Trivia,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Math => "math",
            GameType::Memory => "memory",
            GameType::Reaction => "reaction",
            GameType::Sudoku => "sudoku",
            GameType::Trivia => "trivia",
        }
    }

    /// Elapsed time above which an answer counts as slow
    pub fn slow_threshold_ms(&self) -> u32 {
        match self {
            GameType::Math => 5_000,
            GameType::Memory => 2_000,
            GameType::Reaction => 1_000,
            GameType::Sudoku => 100_000,
            GameType::Trivia => 10_000,
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for GameType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "math" => Ok(GameType::Math),
            "memory" => Ok(GameType::Memory),
            "reaction" => Ok(GameType::Reaction),
            "sudoku" => Ok(GameType::Sudoku),
            "trivia" => Ok(GameType::Trivia),
            _ => Err(s.to_string()),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy = 0,
    Medium = 1,
    Hard = 2,
}

impl Difficulty {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Maps a model output code back to a difficulty; anything outside 0..=2 is rejected
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Difficulty::Easy),
            1 => Some(Difficulty::Medium),
            2 => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Points for a first-try correct answer at this difficulty
    pub fn base_score(&self) -> u32 {
        match self {
            Difficulty::Easy => 30,
            Difficulty::Medium => 60,
            Difficulty::Hard => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Difficulty {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn game_type_round_trips_through_str() {
        for game_type in GameType::iter() {
            assert_eq!(GameType::try_from(game_type.as_str()), Ok(game_type));
        }
        assert_eq!(GameType::try_from("MATH"), Ok(GameType::Math));
        assert!(GameType::try_from("chess").is_err());
    }

    #[test]
    fn difficulty_codes_are_ordered() {
        let codes: Vec<u8> = Difficulty::iter().map(|d| d.code()).collect();
        assert_eq!(codes, vec![0, 1, 2]);
        assert_eq!(Difficulty::from_code(2), Some(Difficulty::Hard));
        assert_eq!(Difficulty::from_code(3), None);
        assert_eq!(Difficulty::from_code(-1), None);
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&GameType::Reaction).unwrap();
        assert_eq!(json, "\"reaction\"");
        let difficulty: Difficulty = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(difficulty, Difficulty::Medium);
    }
}
