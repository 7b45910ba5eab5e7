use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LectureIqError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Service error: {0}")]
    Service(#[from] crate::services::ServiceError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Logging error: {0}")]
    Telemetry(#[from] crate::telemetry::TelemetryError),

    #[error("Upload rejected: {0}")]
    Upload(#[from] crate::lecture::UploadError),

    #[error("Lecture error: {0}")]
    Lecture(#[from] crate::lecture::LectureError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Audio not found: {key}")]
    NotFound { key: String },

    #[error("Transfer of '{key}' failed: {reason}")]
    Transfer { key: String, reason: String },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage '{key}' into '{dir}': {source}")]
    Staging {
        key: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete '{key}': {reason}")]
    Delete { key: String, reason: String },

    #[error("Storage backend misconfigured: {0}")]
    Configuration(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Job queue closed unexpectedly")]
    ChannelClosed,

    #[error("Failed to install signal handler: {0}")]
    Signal(String),
}

pub type Result<T> = std::result::Result<T, LectureIqError>;
