pub mod aggregator;
pub mod features;
pub mod models;
pub mod reward;

mod errors;

pub use aggregator::{
    advance_streak, bucket_key, prepare_game_state, update_category_totals,
    update_frequency_bucket, Streak,
};
pub use errors::StatsError;
pub use features::{
    apply_min_max_scaling, build_feature_vector, game_type_code, FeatureVector, ScaledFeature,
};
pub use models::*;
pub use reward::{calculate_is_slow, calculate_reward, calculate_reward_weight};
