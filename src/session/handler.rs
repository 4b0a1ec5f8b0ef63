use super::batch::{run_batch, BatchReport, BatchTable};
use super::handle::ModelHandle;
use crate::core::{AnalyzerConfig, AnalyzerError, FailurePolicy};
use crate::models::ModelSelector;
use crate::pipelines::sentiment_analysis_pipeline::{
    ClassificationResult, SentimentAnalysisPipeline,
};
use std::fmt;

/// Where the single-text interaction stands after the last submit.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Nothing classified yet, or the last submit was rejected before
    /// inference.
    Idle,
    /// The last submit was classified. `ranked` is the full provider output,
    /// best first; `top` is its first entry.
    Result {
        top: ClassificationResult,
        ranked: Vec<ClassificationResult>,
    },
    /// The last submit failed during inference. No retry is attempted.
    Failed(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("Idle"),
            SessionState::Result { top, .. } => write!(f, "{top}"),
            SessionState::Failed(message) => f.write_str(message),
        }
    }
}

/// Runs the interactions of one session against a [`ModelHandle`].
pub struct SessionHandler {
    handle: ModelHandle,
    selector: ModelSelector,
    failure_policy: FailurePolicy,
    state: SessionState,
}

impl SessionHandler {
    pub fn new(handle: ModelHandle, config: &AnalyzerConfig) -> Self {
        Self {
            handle,
            selector: config.model.clone(),
            failure_policy: config.failure_policy,
            state: SessionState::Idle,
        }
    }

    pub fn model_handle(&self) -> &ModelHandle {
        &self.handle
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether the current model still has to be resolved, i.e. the next
    /// action may block on a download.
    pub async fn needs_resolution(&self) -> bool {
        !self.handle.is_resolved(self.selector.identifier()).await
    }

    /// Switch to another model and resolve it right away. On failure the
    /// previous selection stays active.
    pub async fn select_model(
        &mut self,
        selector: ModelSelector,
    ) -> Result<SentimentAnalysisPipeline, AnalyzerError> {
        let classifier = self.handle.resolve(&selector).await?;
        tracing::info!(model_id = selector.identifier(), "model selected");
        self.selector = selector;
        Ok(classifier)
    }

    pub async fn classifier(&self) -> Result<SentimentAnalysisPipeline, AnalyzerError> {
        self.handle.resolve(&self.selector).await
    }

    /// Validate and classify one text.
    ///
    /// Blank text is rejected with [`AnalyzerError::Validation`] and never
    /// reaches the provider; a model that cannot be resolved is reported as
    /// [`AnalyzerError::ModelLoad`]. Both leave the session `Idle`. Inference
    /// failures are not errors of this call: they put the session in
    /// [`SessionState::Failed`].
    pub async fn submit(&mut self, text: &str) -> Result<&SessionState, AnalyzerError> {
        if text.trim().is_empty() {
            self.state = SessionState::Idle;
            return Err(AnalyzerError::Validation);
        }

        let classifier = match self.classifier().await {
            Ok(classifier) => classifier,
            Err(err) => {
                self.state = SessionState::Idle;
                return Err(err);
            }
        };

        self.state = match self.handle.predictions(&classifier, text).await {
            Ok(ranked) => SessionState::Result {
                top: ranked[0].clone(),
                ranked,
            },
            Err(err) => {
                tracing::warn!(error = %err, "inference failed");
                SessionState::Failed(err.to_string())
            }
        };
        Ok(&self.state)
    }

    /// Classify every row of `table` with the current model.
    pub async fn analyze_batch(&self, table: BatchTable) -> Result<BatchReport, AnalyzerError> {
        let classifier = self.classifier().await?;
        run_batch(&self.handle, &classifier, table, self.failure_policy).await
    }
}
