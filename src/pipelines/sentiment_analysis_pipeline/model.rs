use super::pipeline::ClassificationResult;

/// An inference provider for sentiment classification.
///
/// `predict` returns the provider's predictions for one text, best first.
/// Implementations report any failure (tokenization, forward pass, HTTP) as an
/// error rather than panicking.
#[async_trait::async_trait]
pub trait SentimentAnalysisModel: Send + Sync {
    async fn predict(&self, text: &str) -> anyhow::Result<Vec<ClassificationResult>>;

    /// The repository id this provider is bound to.
    fn model_id(&self) -> &str;
}
