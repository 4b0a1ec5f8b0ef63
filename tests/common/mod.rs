#![allow(dead_code)]

use sentiment_analyzer::session::ModelLoader;
use sentiment_analyzer::{ClassificationResult, SentimentAnalysisModel, SentimentAnalysisPipeline};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Keyword classifier standing in for a real provider.
///
/// `boom` fails, `mystery` comes back without a score, `great`/`love` are
/// positive, `terrible`/`awful` negative, anything else neutral.
pub struct KeywordModel {
    model_id: String,
    calls: Arc<AtomicUsize>,
}

impl KeywordModel {
    pub fn new(model_id: &str, calls: Arc<AtomicUsize>) -> Self {
        Self {
            model_id: model_id.to_string(),
            calls,
        }
    }
}

#[async_trait::async_trait]
impl SentimentAnalysisModel for KeywordModel {
    async fn predict(&self, text: &str) -> anyhow::Result<Vec<ClassificationResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();

        if lower.contains("boom") {
            anyhow::bail!("provider exploded");
        }
        if lower.contains("mystery") {
            return Ok(vec![ClassificationResult::new("POSITIVE", None)]);
        }

        let (top, other) = if lower.contains("great") || lower.contains("love") {
            (("POSITIVE", 0.98), ("NEGATIVE", 0.02))
        } else if lower.contains("terrible") || lower.contains("awful") {
            (("NEGATIVE", 0.97), ("POSITIVE", 0.03))
        } else {
            (("NEUTRAL", 0.6), ("POSITIVE", 0.4))
        };
        Ok(vec![
            ClassificationResult::new(top.0, Some(top.1)),
            ClassificationResult::new(other.0, Some(other.1)),
        ])
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Builds [`KeywordModel`] pipelines and counts loads and predictions.
/// Identifiers starting with `missing/` fail to load.
#[derive(Clone, Default)]
pub struct CountingLoader {
    pub loads: Arc<AtomicUsize>,
    pub predictions: Arc<AtomicUsize>,
}

impl CountingLoader {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn predictions(&self) -> usize {
        self.predictions.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ModelLoader for CountingLoader {
    async fn load(&self, model_id: &str) -> anyhow::Result<SentimentAnalysisPipeline> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if model_id.starts_with("missing/") {
            anyhow::bail!("repository `{model_id}` not found");
        }
        Ok(SentimentAnalysisPipeline::from_model(Arc::new(
            KeywordModel::new(model_id, Arc::clone(&self.predictions)),
        )))
    }
}
