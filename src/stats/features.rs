use serde::{Deserialize, Serialize};

use super::models::{GameState, UserEmbedding};
use crate::game::GameType;

/// Features min-max scaled against the bounds the deployed model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaledFeature {
    TotalQuestions,
    TotalCorrect,
    AverageUserTime,
}

impl ScaledFeature {
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            ScaledFeature::TotalQuestions => (1.0, 1750.0),
            ScaledFeature::TotalCorrect => (1.0, 1530.0),
            ScaledFeature::AverageUserTime => (0.0, 45_000_000.0),
        }
    }
}

/// Scales into [0, 1]. Values outside the bounds are clamped; the minimum maps to exactly 0.
pub fn apply_min_max_scaling(value: f64, feature: ScaledFeature) -> f64 {
    let (min, max) = feature.bounds();
    let clamped = value.clamp(min, max);
    if clamped == min {
        return 0.0;
    }
    (clamped - min) / (max - min)
}

/// Game type as the model's embedding index
pub fn game_type_code(game_type: GameType) -> u8 {
    match game_type {
        GameType::Math => 0,
        GameType::Memory => 1,
        GameType::Reaction => 2,
        GameType::Sudoku => 3,
        GameType::Trivia => 4,
    }
}

/// Model input; `states[0]` is whether the latest answer was slow.
/// Field names are the wire names the model endpoint expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(rename = "data")]
    pub states: [f64; 8],
    #[serde(rename = "user")]
    pub user_features: [f64; 3],
    pub game_type: u8,
}

pub fn build_feature_vector(
    game_state: &GameState,
    user_embedding: &UserEmbedding,
    game_type: GameType,
) -> FeatureVector {
    FeatureVector {
        states: [
            f64::from(u8::from(game_state.prev_is_slow)),
            f64::from(u8::from(game_state.prev_is_correct)),
            apply_min_max_scaling(
                game_state.total_questions as f64,
                ScaledFeature::TotalQuestions,
            ),
            apply_min_max_scaling(game_state.total_correct as f64, ScaledFeature::TotalCorrect),
            game_state.percent_correct,
            game_state.category.percent_correct,
            apply_min_max_scaling(
                game_state.average_user_time_ms,
                ScaledFeature::AverageUserTime,
            ),
            game_state.total_weighted_reward,
        ],
        user_features: user_embedding.as_array(),
        game_type: game_type_code(game_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::models::CategoryState;
    use rstest::rstest;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[rstest]
    #[case(ScaledFeature::TotalQuestions, 1.0, 0.0)]
    #[case(ScaledFeature::TotalQuestions, 0.0, 0.0)]
    #[case(ScaledFeature::TotalQuestions, 1750.0, 1.0)]
    #[case(ScaledFeature::TotalQuestions, 5000.0, 1.0)]
    #[case(ScaledFeature::TotalCorrect, 1.0, 0.0)]
    #[case(ScaledFeature::AverageUserTime, 0.0, 0.0)]
    #[case(ScaledFeature::AverageUserTime, 22_500_000.0, 0.5)]
    fn scaling_edges(#[case] feature: ScaledFeature, #[case] value: f64, #[case] expected: f64) {
        assert_eq!(apply_min_max_scaling(value, feature), expected);
    }

    #[test]
    fn scaled_values_stay_in_unit_range() {
        for value in [-10.0, 0.0, 1.0, 2.0, 875.5, 1749.0, 1e9] {
            let scaled = apply_min_max_scaling(value, ScaledFeature::TotalQuestions);
            assert!((0.0..=1.0).contains(&scaled), "{} scaled to {}", value, scaled);
        }
    }

    #[test]
    fn game_type_codes_are_distinct() {
        let codes: HashSet<u8> = GameType::iter().map(game_type_code).collect();
        assert_eq!(codes.len(), 5);
        assert!(codes.iter().all(|code| *code < 5));
    }

    #[test]
    fn builds_vector_in_fixed_order() {
        let mut state = GameState::empty(GameType::Trivia);
        state.prev_is_slow = true;
        state.prev_is_correct = true;
        state.total_questions = 1;
        state.total_correct = 1;
        state.percent_correct = 1.0;
        state.average_user_time_ms = 12_000.0;
        state.total_weighted_reward = 0.75;
        state.category = CategoryState {
            category: "1980s".to_string(),
            total_questions: 2,
            total_correct: 1,
            percent_correct: 0.5,
            created_at: 0,
        };
        let embedding = UserEmbedding {
            easy_percent: 0.9,
            medium_percent: 0.6,
            hard_percent: 0.2,
        };

        let vector = build_feature_vector(&state, &embedding, GameType::Trivia);

        assert_eq!(vector.states[0], 1.0);
        assert_eq!(vector.states[1], 1.0);
        assert_eq!(vector.states[2], 0.0);
        assert_eq!(vector.states[3], 0.0);
        assert_eq!(vector.states[4], 1.0);
        assert_eq!(vector.states[5], 0.5);
        assert_eq!(vector.states[6], 12_000.0 / 45_000_000.0);
        assert_eq!(vector.states[7], 0.75);
        assert_eq!(vector.user_features, [0.9, 0.6, 0.2]);
        assert_eq!(vector.game_type, 4);
    }

    #[test]
    fn serializes_with_model_field_names() {
        let vector = build_feature_vector(
            &GameState::empty(GameType::Math),
            &UserEmbedding::default(),
            GameType::Math,
        );
        let json = serde_json::to_value(&vector).unwrap();
        assert_eq!(json["data"].as_array().map(|a| a.len()), Some(8));
        assert_eq!(json["user"].as_array().map(|a| a.len()), Some(3));
        assert_eq!(json["game_type"], 0);
    }
}
