pub mod cache;
pub mod config;
pub mod error;

pub use cache::ModelCache;
pub use config::{AnalyzerConfig, Backend, FailurePolicy, DEFAULT_API_ENDPOINT};
pub use error::AnalyzerError;
