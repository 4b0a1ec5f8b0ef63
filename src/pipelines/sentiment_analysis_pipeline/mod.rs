//! Sentiment analysis pipeline for classifying the emotional tone of text.
//!
//! ## Main Types
//!
//! - [`SentimentAnalysisPipeline`] - a resolved classifier bound to one model id
//! - [`SentimentAnalysisPipelineBuilder`] - picks the model id, backend and device
//! - [`SentimentAnalysisModel`] - trait implemented by inference providers
//! - [`ClassificationResult`] - a label and its optional confidence score
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use sentiment_analyzer::pipelines::sentiment_analysis_pipeline::*;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let pipeline = SentimentAnalysisPipelineBuilder::new("distilbert-base-uncased-finetuned-sst-2-english")
//!     .build()
//!     .await?;
//!
//! let result = pipeline.classify("I love this product!").await?;
//! println!("Sentiment: {} (confidence: {})", result.label, result.formatted_score());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod model;
pub mod pipeline;

pub use builder::SentimentAnalysisPipelineBuilder;
pub use model::SentimentAnalysisModel;
pub use pipeline::{ClassificationResult, SentimentAnalysisPipeline};

pub use crate::core::Backend;
pub use crate::models::SentimentPreset;
