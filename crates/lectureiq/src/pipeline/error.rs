use thiserror::Error;

use super::progress::ProgressError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Audio unavailable: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("{0}")]
    Service(#[from] crate::services::ServiceError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Progress update failed: {0}")]
    Progress(#[from] ProgressError),
}

impl PipelineError {
    /// The lecture is gone or belongs to a newer run; the job is dropped
    /// without retrying or writing.
    pub fn is_stale(&self) -> bool {
        matches!(self, PipelineError::Progress(e) if e.is_stale())
    }
}

/// Problems that did not stop the run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    ResourceLookupFailed { error: String },
    PlaceholderContent { artifact: &'static str, reason: String },
}
