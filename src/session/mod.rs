//! Interactive session: model resolution, single-text submits and CSV batches.
//!
//! - [`ModelHandle`] - resolves model identifiers once and runs classifiers
//! - [`SessionHandler`] - the single-text state machine and batch entry point
//! - [`batch`] - CSV import, per-row classification and export

pub mod batch;
pub mod handle;
pub mod handler;

pub use batch::{run_batch, BatchRecord, BatchReport, BatchTable};
pub use handle::{ModelHandle, ModelLoader, PipelineLoader};
pub use handler::{SessionHandler, SessionState};
