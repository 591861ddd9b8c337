use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{ModelVariant, PredictionError, PredictionModel};
use crate::stats::FeatureVector;

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    data: &'a [f64; 8],
    user: &'a [f64; 3],
    game_type: u8,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    body: Option<Value>,
}

/// Reads the `body` field: an integer, or a string that starts with one
pub(crate) fn parse_prediction(body: Option<Value>) -> Result<Option<i64>, PredictionError> {
    match body {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value.trunc() as i64))
            .map(Some)
            .ok_or_else(|| PredictionError::InvalidResponse(number.to_string())),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            let end = trimmed
                .char_indices()
                .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
                .map(|(i, _)| i)
                .unwrap_or(trimmed.len());
            trimmed[..end]
                .parse::<i64>()
                .map(Some)
                .map_err(|_| PredictionError::InvalidResponse(format!("body {:?}", text)))
        }
        Some(other) => Err(PredictionError::InvalidResponse(format!(
            "unexpected body {}",
            other
        ))),
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Calls the model over HTTP at `{endpoint}/{variant}`
#[derive(Debug, Clone)]
pub struct HttpPredictionModel {
    client: Client,
    endpoint: String,
}

impl HttpPredictionModel {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self, PredictionError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PredictionError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, variant: ModelVariant) -> String {
        format!("{}/{}", self.endpoint, variant)
    }
}

#[async_trait]
impl PredictionModel for HttpPredictionModel {
    #[instrument(skip(self, vector), fields(variant = %variant))]
    async fn predict(
        &self,
        vector: &FeatureVector,
        variant: ModelVariant,
    ) -> Result<Option<i64>, PredictionError> {
        let request = PredictionRequest {
            data: &vector.states,
            user: &vector.user_features,
            game_type: vector.game_type,
        };

        let response = self
            .client
            .post(self.url(variant))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PredictionError::Timeout
                } else {
                    PredictionError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = format!("{} returned {}", variant, status);
            return Err(if is_retryable_status(status) {
                PredictionError::Unavailable(detail)
            } else {
                PredictionError::InvalidResponse(detail)
            });
        }

        let parsed: PredictionResponse = response
            .json()
            .await
            .map_err(|e| PredictionError::InvalidResponse(e.to_string()))?;
        let prediction = parse_prediction(parsed.body)?;
        debug!(?prediction, "Model answered");
        Ok(prediction)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameType;
    use crate::stats::{build_feature_vector, GameState, UserEmbedding};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(2), Some(2))]
    #[case(json!("1"), Some(1))]
    #[case(json!(" 0 "), Some(0))]
    #[case(json!("2.0"), Some(2))]
    #[case(json!(1.9), Some(1))]
    #[case(json!(null), None)]
    fn parses_model_bodies(#[case] body: Value, #[case] expected: Option<i64>) {
        assert_eq!(parse_prediction(Some(body)).unwrap(), expected);
    }

    #[test]
    fn missing_body_is_no_prediction() {
        assert_eq!(parse_prediction(None).unwrap(), None);
    }

    #[rstest]
    #[case(json!("hard"))]
    #[case(json!({"difficulty": 2}))]
    #[case(json!([1]))]
    fn rejects_non_numeric_bodies(#[case] body: Value) {
        assert!(matches!(
            parse_prediction(Some(body)),
            Err(PredictionError::InvalidResponse(_))
        ));
    }

    #[test]
    fn request_uses_model_field_names() {
        let vector = build_feature_vector(
            &GameState::empty(GameType::Reaction),
            &UserEmbedding::default(),
            GameType::Reaction,
        );
        let request = PredictionRequest {
            data: &vector.states,
            user: &vector.user_features,
            game_type: vector.game_type,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["game_type"], 2);
        assert_eq!(json["data"].as_array().unwrap().len(), 8);
    }

    #[test]
    fn builds_variant_urls() {
        let model =
            HttpPredictionModel::new("http://model.local/predict/", Duration::from_secs(1)).unwrap();
        assert_eq!(model.url(ModelVariant::Primary), "http://model.local/predict/primary");
        assert_eq!(model.url(ModelVariant::Target), "http://model.local/predict/target");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let model =
            HttpPredictionModel::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let vector = build_feature_vector(
            &GameState::empty(GameType::Math),
            &UserEmbedding::default(),
            GameType::Math,
        );

        let result = model.predict(&vector, ModelVariant::Primary).await;
        assert!(matches!(
            result,
            Err(PredictionError::Unavailable(_)) | Err(PredictionError::Timeout)
        ));
    }
}
