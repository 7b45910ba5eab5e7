pub mod checkpoint;
pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod retry;
pub mod runner;

pub use checkpoint::Checkpoint;
pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{PipelineError, PipelineWarning};
pub use progress::{
    LogProgress, NoopProgress, ProgressError, ProgressEvent, ProgressReporter, ProgressTracker,
};
pub use retry::{RetryDecision, RetryPolicy};
pub use runner::{Pipeline, RunOutcome, Services};
