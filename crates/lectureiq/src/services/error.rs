use std::path::PathBuf;

use thiserror::Error;

/// Failures of the external collaborators the pipeline calls.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Audio file not found: {0}")]
    AudioNotFound(PathBuf),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Language model request failed: {0}")]
    LanguageModel(String),

    #[error("Resource lookup failed: {0}")]
    ResourceLookup(String),

    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },

    #[error("Credential error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}
