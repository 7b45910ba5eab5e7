pub mod config;
pub mod db;
pub mod error;
pub mod lecture;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod services;
pub mod storage;
pub mod telemetry;
pub mod worker;

pub use config::{load_config, load_config_from_str, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, LectureIqError, Result, StorageError, WorkerError};
pub use lecture::{Lecture, LectureDetail, LectureError, LectureService, LectureStatus, UploadError};
pub use pipeline::{Checkpoint, Pipeline, PipelineConfig, RunOutcome, Services};
pub use secrets::{resolve_secret, SecretError, SecretSource};
pub use storage::StorageLocator;
pub use telemetry::init_logging;
pub use worker::{recover_unfinished, DelayQueue, JobQueue, JobResult, JobStatus, PipelineJob, WorkerPool};
