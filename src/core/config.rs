use crate::models::ModelSelector;
use crate::pipelines::utils::DeviceRequest;

/// Default base URL of the Hugging Face Inference API.
pub const DEFAULT_API_ENDPOINT: &str = "https://api-inference.huggingface.co/models";

/// Where classification runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backend {
    /// Download the checkpoint and run it locally with Candle.
    #[default]
    Local,
    /// Send each text to the Hugging Face Inference API.
    Api,
}

/// What a batch does when one row fails to classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FailurePolicy {
    /// Write an `ERROR` row with an empty score and keep going.
    #[default]
    Record,
    /// Stop the batch at the failing row.
    Abort,
}

/// Settings shared by every interaction of a session.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub model: ModelSelector,
    pub backend: Backend,
    pub device: DeviceRequest,
    pub api_token: Option<String>,
    pub api_endpoint: String,
    pub failure_policy: FailurePolicy,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model: ModelSelector::default(),
            backend: Backend::default(),
            device: DeviceRequest::default(),
            api_token: None,
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            failure_policy: FailurePolicy::default(),
        }
    }
}
