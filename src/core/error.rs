use thiserror::Error;

/// Errors reported to the user for a single interaction.
///
/// None of these end the process. Each one is scoped to the submit or batch
/// action that produced it.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Empty or whitespace-only text was submitted. No inference was run.
    #[error("Please enter some text first.")]
    Validation,

    /// The inference provider failed. `row` is the 1-based data row in batch
    /// mode.
    #[error("Model inference failed{}: {message}", row_suffix(.row))]
    Inference { message: String, row: Option<usize> },

    /// The uploaded table lacks a required column.
    #[error("CSV must contain a column named `{column}`.")]
    Schema { column: String },

    /// A data row has more fields than the header. `row` is 1-based.
    #[error("CSV row {row} has {found} fields but the header has {expected}.")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },

    /// A model identifier could not be resolved to a classifier.
    #[error("Failed to load model `{model_id}`: {message}")]
    ModelLoad { model_id: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyzerError {
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
            message: message.into(),
            row: None,
        }
    }

    pub fn model_load(model_id: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::ModelLoad {
            model_id: model_id.into(),
            message: format!("{error:#}"),
        }
    }

    /// Attach a batch row number to an inference failure.
    pub fn at_row(self, row: usize) -> Self {
        match self {
            Self::Inference { message, .. } => Self::Inference {
                message,
                row: Some(row),
            },
            other => other,
        }
    }
}

fn row_suffix(row: &Option<usize>) -> String {
    row.map(|r| format!(" on row {r}")).unwrap_or_default()
}
