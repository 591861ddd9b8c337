pub mod http;
pub mod policy;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::retry::Retryable;
use crate::stats::FeatureVector;

pub use http::HttpPredictionModel;
pub use policy::{predict_difficulty, ModelCallPolicy};

/// The two model endpoints consulted per attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    /// Difficulty the user is predicted to handle next
    Primary,
    /// Difficulty the user should be steered towards
    Target,
}

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Primary => "primary",
            ModelVariant::Target => "target",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictionError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Model call timed out")]
    Timeout,

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

impl Retryable for PredictionError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            PredictionError::Unavailable(_) | PredictionError::Timeout
        )
    }
}

/// External difficulty-prediction model
#[async_trait]
pub trait PredictionModel: Send + Sync {
    /// Raw difficulty code, or `None` when the model has no answer
    async fn predict(
        &self,
        vector: &FeatureVector,
        variant: ModelVariant,
    ) -> Result<Option<i64>, PredictionError>;

    fn name(&self) -> &'static str;
}

/// Used when no model endpoint is configured; every prediction falls back
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflinePredictionModel;

#[async_trait]
impl PredictionModel for OfflinePredictionModel {
    async fn predict(
        &self,
        _vector: &FeatureVector,
        _variant: ModelVariant,
    ) -> Result<Option<i64>, PredictionError> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}
