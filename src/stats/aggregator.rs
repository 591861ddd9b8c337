use chrono::{Datelike, Duration, NaiveDate};

use super::{
    models::{ratio, round3, CategoryState, Frequency, GameState, UserStatistics},
    reward::{calculate_is_slow, calculate_reward, calculate_reward_weight},
    StatsError,
};
use crate::game::{normalize_category, Attempt, GameType, MAX_ELAPSED_MS};

/// Folds one attempt into the game aggregate. `prior` is never modified; the
/// category snapshot embedded in the result is the caller's already-updated state.
pub fn prepare_game_state(
    attempt: &Attempt,
    prior: &GameState,
    category: &CategoryState,
) -> Result<GameState, StatsError> {
    attempt.validate()?;
    if prior.game_type != attempt.game_type {
        return Err(StatsError::Validation(format!(
            "attempt for {} cannot fold into {} state",
            attempt.game_type, prior.game_type
        )));
    }
    if prior.total_correct > prior.total_questions {
        return Err(StatsError::Validation(format!(
            "prior state has {} correct out of {} questions",
            prior.total_correct, prior.total_questions
        )));
    }

    let total_questions = prior.total_questions + 1;
    let total_correct = prior.total_correct + u64::from(attempt.correct);
    let total_elapsed_time_ms = prior
        .total_elapsed_time_ms
        .saturating_add(u64::from(attempt.elapsed_time_ms))
        .min(u64::from(MAX_ELAPSED_MS));

    let reward_weight = calculate_reward_weight(attempt.difficulty, attempt.correct);
    let reward = calculate_reward(reward_weight, attempt.correct);
    let reward_weight_cumulative = prior.reward_weight_cumulative + u64::from(reward_weight);
    let reward_cumulative = prior.reward_cumulative + u64::from(reward);

    Ok(GameState {
        game_type: attempt.game_type,
        prev_is_slow: calculate_is_slow(attempt.game_type, attempt.elapsed_time_ms),
        prev_is_correct: attempt.correct,
        total_questions,
        total_correct,
        percent_correct: ratio(total_correct, total_questions),
        total_elapsed_time_ms,
        average_user_time_ms: round3(total_elapsed_time_ms as f64 / total_questions as f64),
        reward_weight,
        reward,
        reward_weight_cumulative,
        reward_cumulative,
        total_weighted_reward: ratio(reward_cumulative, reward_weight_cumulative),
        score: attempt.score,
        difficulty: attempt.difficulty,
        predicted_difficulty: prior.predicted_difficulty,
        target_difficulty: prior.target_difficulty,
        category: category.clone(),
        user_embedding: prior.user_embedding,
        created_at: prior.created_at,
    })
}

/// Increments category totals. An incorrect answer keeps the prior correct count.
pub fn update_category_totals(
    prior: &CategoryState,
    attempt: &Attempt,
) -> Result<CategoryState, StatsError> {
    attempt.validate()?;
    let category = normalize_category(&attempt.category);
    if !prior.category.is_empty() && normalize_category(&prior.category) != category {
        return Err(StatsError::Validation(format!(
            "attempt for category {} cannot fold into {}",
            attempt.category, prior.category
        )));
    }

    let total_questions = prior.total_questions + 1;
    let total_correct = prior.total_correct + u64::from(attempt.correct);

    Ok(CategoryState {
        category,
        total_questions,
        total_correct,
        percent_correct: ratio(total_correct, total_questions),
        created_at: prior.created_at,
    })
}

/// Folds an attempt into one statistics bucket. Daily and weekly priors from another
/// bucket are discarded; the overall record carries its totals into the new bucket.
pub fn update_frequency_bucket(
    frequency: Frequency,
    bucket_key: &str,
    prior: Option<&UserStatistics>,
    game_type: GameType,
    attempt: &Attempt,
) -> Result<UserStatistics, StatsError> {
    attempt.validate()?;
    if game_type != attempt.game_type {
        return Err(StatsError::Validation(format!(
            "statistics for {} given an attempt for {}",
            game_type, attempt.game_type
        )));
    }

    let mut stats = match prior {
        Some(prior) if prior.frequency != frequency => {
            return Err(StatsError::Validation(format!(
                "{} statistics given a {} prior",
                frequency, prior.frequency
            )));
        }
        Some(prior) if prior.bucket == bucket_key || frequency == Frequency::Overall => {
            let mut carried = prior.clone();
            carried.bucket = bucket_key.to_string();
            carried
        }
        _ => UserStatistics::empty(frequency, bucket_key),
    };

    stats.total = stats.total.record(attempt.correct);
    let game = stats.game(game_type).record(attempt.correct);
    stats.games.insert(game_type, game);
    let difficulty = stats.difficulty(attempt.difficulty).record(attempt.correct);
    stats.difficulties.insert(attempt.difficulty, difficulty);

    Ok(stats)
}

/// Sort key of the bucket `date` falls in
pub fn bucket_key(frequency: Frequency, date: NaiveDate) -> String {
    let bucket_date = match frequency {
        Frequency::Weekly => {
            date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
        }
        Frequency::Daily | Frequency::Overall => date,
    };
    bucket_date.format("%Y%m%d").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
}

/// Day streak after activity on `today`, given the last day the user was active
pub fn advance_streak(prior: Streak, last_active: Option<NaiveDate>, today: NaiveDate) -> Streak {
    let current = match last_active {
        Some(day) if day == today => prior.current.max(1),
        Some(day) if day.succ_opt() == Some(today) => prior.current + 1,
        _ => 1,
    };
    Streak {
        current,
        longest: prior.longest.max(current),
    }
}
