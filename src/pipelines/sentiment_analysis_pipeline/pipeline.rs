use super::model::SentimentAnalysisModel;
use crate::core::AnalyzerError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// One sentiment prediction.
///
/// `score` is the provider's confidence in `[0, 1]`, or `None` when the
/// provider did not report one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub score: Option<f32>,
}

impl ClassificationResult {
    pub fn new(label: impl Into<String>, score: Option<f32>) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }

    /// The score with three decimals, or `N/A` when unknown.
    pub fn formatted_score(&self) -> String {
        match self.score {
            Some(score) => format!("{score:.3}"),
            None => "N/A".to_string(),
        }
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label: {}  Score: {}", self.label, self.formatted_score())
    }
}

/// A resolved classifier bound to one model identifier.
///
/// Cloning is cheap; clones share the loaded model.
#[derive(Clone)]
pub struct SentimentAnalysisPipeline {
    pub(crate) model: Arc<dyn SentimentAnalysisModel>,
}

impl SentimentAnalysisPipeline {
    pub fn from_model(model: Arc<dyn SentimentAnalysisModel>) -> Self {
        Self { model }
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// All predictions for `text`, best first, validated.
    pub async fn predictions(&self, text: &str) -> Result<Vec<ClassificationResult>, AnalyzerError> {
        let raw = self
            .model
            .predict(text)
            .await
            .map_err(|e| AnalyzerError::inference(format!("{e:#}")))?;
        normalize(raw)
    }

    /// The top prediction for `text`.
    pub async fn classify(&self, text: &str) -> Result<ClassificationResult, AnalyzerError> {
        let mut ranked = self.predictions(text).await?;
        Ok(ranked.swap_remove(0))
    }
}

impl fmt::Debug for SentimentAnalysisPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentimentAnalysisPipeline")
            .field("model_id", &self.model_id())
            .finish()
    }
}

/// Check provider output before it goes any further: at least one
/// prediction, NaN scores read as unknown, scores outside `[0, 1]` rejected.
/// The result is ranked by score, unknown scores last.
pub(crate) fn normalize(
    predictions: Vec<ClassificationResult>,
) -> Result<Vec<ClassificationResult>, AnalyzerError> {
    if predictions.is_empty() {
        return Err(AnalyzerError::inference("provider returned no predictions"));
    }

    let mut ranked = predictions
        .into_iter()
        .map(|prediction| match prediction.score {
            Some(score) if score.is_nan() => Ok(ClassificationResult {
                score: None,
                ..prediction
            }),
            Some(score) if !(0.0..=1.0).contains(&score) => Err(AnalyzerError::inference(
                format!("provider returned score {score} for `{}`", prediction.label),
            )),
            _ => Ok(prediction),
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Stable, so ties keep the provider's order.
    ranked.sort_by(|a, b| match (a.score, b.score) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    Ok(ranked)
}
