//! Remote classification through the Hugging Face Inference API.
//!
//! No weights are downloaded; every prediction is an HTTP round trip. The API
//! answers with a loosely shaped JSON body (nested list, flat list, single
//! object or an error object), which is turned into typed predictions here.

use crate::pipelines::sentiment_analysis_pipeline::{ClassificationResult, SentimentAnalysisModel};
use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawPrediction {
    label: Option<String>,
    score: Option<f64>,
}

impl TryFrom<RawPrediction> for ClassificationResult {
    type Error = anyhow::Error;

    fn try_from(raw: RawPrediction) -> anyhow::Result<Self> {
        if raw.label.is_none() && raw.score.is_none() {
            anyhow::bail!("Inference API returned a prediction with neither label nor score");
        }
        Ok(ClassificationResult::new(
            raw.label.unwrap_or_default(),
            raw.score.map(|s| s as f32),
        ))
    }
}

fn convert(predictions: Vec<RawPrediction>) -> anyhow::Result<Vec<ClassificationResult>> {
    predictions.into_iter().map(TryInto::try_into).collect()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResponse {
    Failure { error: serde_json::Value },
    Nested(Vec<Vec<RawPrediction>>),
    Flat(Vec<RawPrediction>),
    Single(RawPrediction),
}

impl ApiResponse {
    fn into_predictions(self) -> anyhow::Result<Vec<ClassificationResult>> {
        match self {
            ApiResponse::Failure { error } => match error {
                serde_json::Value::String(message) => anyhow::bail!("Inference API error: {message}"),
                other => anyhow::bail!("Inference API error: {other}"),
            },
            ApiResponse::Nested(batches) => convert(batches.into_iter().next().unwrap_or_default()),
            ApiResponse::Flat(predictions) => convert(predictions),
            ApiResponse::Single(prediction) => convert(vec![prediction]),
        }
    }
}

/// Parse an Inference API response body into predictions, best first.
pub fn parse_response(body: &str) -> anyhow::Result<Vec<ClassificationResult>> {
    let response: ApiResponse = serde_json::from_str(body)
        .with_context(|| format!("Unexpected Inference API response: {body}"))?;
    response.into_predictions()
}

/// A classifier hosted by the Hugging Face Inference API.
pub struct InferenceApiModel {
    model_id: String,
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl InferenceApiModel {
    pub fn new(model_id: &str, endpoint: &str, token: Option<String>) -> Self {
        Self {
            model_id: model_id.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> String {
        format!("{}/{}", self.endpoint, self.model_id)
    }
}

#[async_trait::async_trait]
impl SentimentAnalysisModel for InferenceApiModel {
    async fn predict(&self, text: &str) -> anyhow::Result<Vec<ClassificationResult>> {
        let mut request = self
            .client
            .post(self.url())
            .json(&serde_json::json!({ "inputs": text }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.url()))?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            anyhow::bail!("Inference API returned {status}: {body}");
        }
        parse_response(&body)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
