pub mod cli;
pub mod console;
pub mod core;
mod loaders;
pub mod models;
pub mod pipelines;
pub mod session;

// Re-export core types
pub use crate::core::{AnalyzerConfig, AnalyzerError, Backend, FailurePolicy};

// Re-export the types most callers need
pub use models::{ModelSelector, SentimentPreset};
pub use pipelines::sentiment_analysis_pipeline::{
    ClassificationResult, SentimentAnalysisModel, SentimentAnalysisPipeline,
    SentimentAnalysisPipelineBuilder,
};
pub use session::{BatchReport, BatchTable, ModelHandle, ModelLoader, SessionHandler, SessionState};
