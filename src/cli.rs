use crate::core::{AnalyzerConfig, Backend, FailurePolicy, DEFAULT_API_ENDPOINT};
use crate::models::{ModelSelector, SentimentPreset};
use crate::pipelines::utils::DeviceRequest;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sentiment-analyzer")]
#[command(author, version, about = "Sentiment analysis with Hugging Face models")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Where classification runs
    #[arg(long, global = true, value_enum, default_value_t = Backend::Local)]
    pub backend: Backend,

    /// Force CPU inference
    #[arg(long, global = true, conflicts_with = "cuda")]
    pub cpu: bool,

    /// Run on the given CUDA device
    #[arg(long, global = true, value_name = "INDEX")]
    pub cuda: Option<usize>,

    /// Hugging Face token for the Inference API
    #[arg(long, global = true, env = "HF_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Base URL of the Inference API
    #[arg(long, global = true, default_value = DEFAULT_API_ENDPOINT)]
    pub api_endpoint: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a single text
    Analyze {
        /// Text to analyze
        text: String,

        #[command(flatten)]
        model: ModelArgs,

        /// Print every label with its score as JSON
        #[arg(long)]
        raw: bool,
    },

    /// Classify every row of a CSV file with a `text` column
    Batch {
        /// Input CSV file
        input: PathBuf,

        /// Where to write the results
        #[arg(short, long, default_value = crate::session::batch::DEFAULT_EXPORT_NAME)]
        output: PathBuf,

        /// What to do when a row fails to classify
        #[arg(long, value_enum, default_value_t = FailurePolicy::Record)]
        on_error: FailurePolicy,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Read texts line by line and classify each one
    Interactive {
        /// What `:batch` does when a row fails to classify
        #[arg(long, value_enum, default_value_t = FailurePolicy::Record)]
        on_error: FailurePolicy,

        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// Pre-trained sentiment model
    #[arg(short, long, value_enum, default_value_t = SentimentPreset::DistilbertSst2)]
    pub model: SentimentPreset,

    /// Any Hugging Face repository id; overrides --model
    #[arg(long, value_name = "REPO_ID")]
    pub custom_model: Option<String>,
}

impl ModelArgs {
    pub fn selector(&self) -> ModelSelector {
        ModelSelector::from_choice(self.model, self.custom_model.as_deref())
    }
}

impl Cli {
    fn device(&self) -> DeviceRequest {
        match (self.cpu, self.cuda) {
            (true, _) => DeviceRequest::Cpu,
            (false, Some(index)) => DeviceRequest::Cuda(index),
            (false, None) => DeviceRequest::Default,
        }
    }

    /// Session settings for the parsed command line.
    pub fn config(&self) -> AnalyzerConfig {
        let (model, failure_policy) = match &self.command {
            Commands::Analyze { model, .. } => (model.selector(), FailurePolicy::default()),
            Commands::Batch {
                model, on_error, ..
            }
            | Commands::Interactive { model, on_error } => (model.selector(), *on_error),
        };

        AnalyzerConfig {
            model,
            backend: self.backend,
            device: self.device(),
            api_token: self.api_token.clone(),
            api_endpoint: self.api_endpoint.clone(),
            failure_policy,
        }
    }
}
