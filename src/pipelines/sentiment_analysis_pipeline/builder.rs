use super::pipeline::SentimentAnalysisPipeline;
use crate::core::{Backend, DEFAULT_API_ENDPOINT};
use crate::models::{InferenceApiModel, SentimentPreset, SequenceClassificationModel};
use crate::pipelines::utils::DeviceRequest;
use std::sync::Arc;

/// Builds a [`SentimentAnalysisPipeline`] for one model identifier.
///
/// ```rust,no_run
/// use sentiment_analyzer::pipelines::sentiment_analysis_pipeline::*;
///
/// # async fn run() -> anyhow::Result<()> {
/// let pipeline = SentimentAnalysisPipelineBuilder::preset(SentimentPreset::DistilbertSst2)
///     .cpu()
///     .build()
///     .await?;
/// let result = pipeline.classify("I love this product!").await?;
/// println!("{result}");
/// # Ok(())
/// # }
/// ```
pub struct SentimentAnalysisPipelineBuilder {
    model_id: String,
    backend: Backend,
    device_request: DeviceRequest,
    api_token: Option<String>,
    api_endpoint: String,
}

impl SentimentAnalysisPipelineBuilder {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            backend: Backend::Local,
            device_request: DeviceRequest::Default,
            api_token: None,
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
        }
    }

    pub fn preset(preset: SentimentPreset) -> Self {
        Self::new(preset.model_id())
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn cpu(mut self) -> Self {
        self.device_request = DeviceRequest::Cpu;
        self
    }

    pub fn device_request(mut self, request: DeviceRequest) -> Self {
        self.device_request = request;
        self
    }

    pub fn api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token;
        self
    }

    pub fn api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = endpoint.into();
        self
    }

    pub async fn build(self) -> anyhow::Result<SentimentAnalysisPipeline> {
        let model: Arc<dyn super::SentimentAnalysisModel> = match self.backend {
            Backend::Local => {
                let device = self.device_request.resolve()?;
                Arc::new(SequenceClassificationModel::from_hub(&self.model_id, device).await?)
            }
            Backend::Api => Arc::new(InferenceApiModel::new(
                &self.model_id,
                &self.api_endpoint,
                self.api_token,
            )),
        };
        Ok(SentimentAnalysisPipeline::from_model(model))
    }
}
