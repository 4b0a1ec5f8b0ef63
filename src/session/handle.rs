use crate::core::{AnalyzerConfig, AnalyzerError, Backend, ModelCache};
use crate::models::ModelSelector;
use crate::pipelines::sentiment_analysis_pipeline::{
    ClassificationResult, SentimentAnalysisPipeline, SentimentAnalysisPipelineBuilder,
};
use crate::pipelines::utils::DeviceRequest;
use std::sync::Arc;

/// Turns a model identifier into a ready classifier.
#[async_trait::async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, model_id: &str) -> anyhow::Result<SentimentAnalysisPipeline>;
}

/// Loads pipelines with the backend and device from the session config.
#[derive(Debug, Clone)]
pub struct PipelineLoader {
    backend: Backend,
    device: DeviceRequest,
    api_token: Option<String>,
    api_endpoint: String,
}

impl PipelineLoader {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            backend: config.backend,
            device: config.device.clone(),
            api_token: config.api_token.clone(),
            api_endpoint: config.api_endpoint.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ModelLoader for PipelineLoader {
    async fn load(&self, model_id: &str) -> anyhow::Result<SentimentAnalysisPipeline> {
        SentimentAnalysisPipelineBuilder::new(model_id)
            .backend(self.backend)
            .device_request(self.device.clone())
            .api_token(self.api_token.clone())
            .api_endpoint(self.api_endpoint.clone())
            .build()
            .await
    }
}

/// Resolves and memoizes classifiers, and runs them.
///
/// Each identifier is resolved at most once per handle; later resolutions
/// return the cached pipeline.
pub struct ModelHandle {
    loader: Arc<dyn ModelLoader>,
    cache: ModelCache<SentimentAnalysisPipeline>,
}

impl ModelHandle {
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self {
            loader: Arc::new(loader),
            cache: ModelCache::new(),
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(PipelineLoader::new(config))
    }

    pub async fn resolve(
        &self,
        selector: &ModelSelector,
    ) -> Result<SentimentAnalysisPipeline, AnalyzerError> {
        let model_id = selector.identifier();
        let loader = Arc::clone(&self.loader);

        self.cache
            .get_or_create_async(model_id, || async move {
                tracing::info!(model_id, "resolving classifier");
                let started = std::time::Instant::now();
                let pipeline = loader.load(model_id).await?;
                tracing::info!(model_id, elapsed = ?started.elapsed(), "classifier ready");
                Ok(pipeline)
            })
            .await
            .map_err(|e| {
                tracing::warn!(model_id, error = %e, "failed to resolve classifier");
                AnalyzerError::model_load(model_id, &e)
            })
    }

    /// Whether `model_id` is already resolved. The first resolution of an
    /// identifier can take a while, callers use this to show a busy notice.
    pub async fn is_resolved(&self, model_id: &str) -> bool {
        self.cache.contains(model_id).await
    }

    pub async fn resolved_count(&self) -> usize {
        self.cache.len().await
    }

    pub async fn classify(
        &self,
        classifier: &SentimentAnalysisPipeline,
        text: &str,
    ) -> Result<ClassificationResult, AnalyzerError> {
        classifier.classify(text).await
    }

    /// The full ranked output for `text`.
    pub async fn predictions(
        &self,
        classifier: &SentimentAnalysisPipeline,
        text: &str,
    ) -> Result<Vec<ClassificationResult>, AnalyzerError> {
        classifier.predictions(text).await
    }
}
