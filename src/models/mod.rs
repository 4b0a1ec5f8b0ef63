pub mod inference_api;
pub mod sequence_classification;

pub use inference_api::InferenceApiModel;
pub use sequence_classification::{
    Architecture, EncoderConfig, HiddenAct, SequenceClassificationModel, SequenceClassifier,
};

use std::fmt;

/// Pre-trained sentiment checkpoints offered by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SentimentPreset {
    /// Small and fast English model, binary POSITIVE / NEGATIVE.
    #[default]
    #[value(name = "distilbert-sst2")]
    DistilbertSst2,
    /// Multilingual product reviews, `1 star` to `5 stars`.
    #[value(name = "nlptown-multilingual")]
    NlptownMultilingual,
    /// English tweets, negative / neutral / positive.
    #[value(name = "cardiffnlp-twitter")]
    CardiffnlpTwitter,
}

impl SentimentPreset {
    pub const ALL: [SentimentPreset; 3] = [
        SentimentPreset::DistilbertSst2,
        SentimentPreset::NlptownMultilingual,
        SentimentPreset::CardiffnlpTwitter,
    ];

    /// The Hugging Face repository of this preset.
    pub fn model_id(&self) -> &'static str {
        match self {
            SentimentPreset::DistilbertSst2 => "distilbert-base-uncased-finetuned-sst-2-english",
            SentimentPreset::NlptownMultilingual => {
                "nlptown/bert-base-multilingual-uncased-sentiment"
            }
            SentimentPreset::CardiffnlpTwitter => "cardiffnlp/twitter-roberta-base-sentiment",
        }
    }
}

/// Chooses which classifier a session uses.
///
/// Either a preset or a free-text repository id. A custom id that is not
/// blank always wins over the preset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelSelector {
    identifier: String,
}

impl ModelSelector {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into().trim().to_string(),
        }
    }

    pub fn from_choice(preset: SentimentPreset, custom: Option<&str>) -> Self {
        match custom.map(str::trim) {
            Some(custom) if !custom.is_empty() => Self::new(custom),
            _ => preset.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        SentimentPreset::default().into()
    }
}

impl From<SentimentPreset> for ModelSelector {
    fn from(preset: SentimentPreset) -> Self {
        Self::new(preset.model_id())
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}
