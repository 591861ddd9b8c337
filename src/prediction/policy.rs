use std::time::Duration;
use tracing::{debug, instrument};

use super::{ModelVariant, PredictionError, PredictionModel};
use crate::game::Difficulty;
use crate::retry::{with_retry, RetryPolicy};
use crate::stats::FeatureVector;

/// Retry budget and hard deadline for one model call
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCallPolicy {
    pub retry: RetryPolicy,
    pub deadline: Duration,
}

impl Default for ModelCallPolicy {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::model_default(),
            deadline: Duration::from_secs(3),
        }
    }
}

/// Asks the model for a difficulty. A missing or out-of-range answer is an error
/// so the caller can fall back to the prior value.
#[instrument(skip(model, vector, policy), fields(model = model.name(), variant = %variant))]
pub async fn predict_difficulty(
    model: &dyn PredictionModel,
    vector: &FeatureVector,
    variant: ModelVariant,
    policy: &ModelCallPolicy,
) -> Result<Difficulty, PredictionError> {
    let label = match variant {
        ModelVariant::Primary => "model.primary",
        ModelVariant::Target => "model.target",
    };
    let call = with_retry(&policy.retry, label, || model.predict(vector, variant));

    let code = tokio::time::timeout(policy.deadline, call)
        .await
        .map_err(|_| PredictionError::Timeout)?
        .map_err(|failure| failure.error)?
        .ok_or_else(|| PredictionError::InvalidResponse("model returned no prediction".to_string()))?;

    let difficulty = Difficulty::from_code(code).ok_or_else(|| {
        PredictionError::InvalidResponse(format!("difficulty code {} out of range", code))
    })?;
    debug!(%difficulty, "Prediction accepted");
    Ok(difficulty)
}
