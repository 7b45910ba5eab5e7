pub mod job;
pub mod pool;
pub mod queue;
pub mod recovery;

pub use job::{JobResult, JobStatus, PipelineJob};
pub use pool::WorkerPool;
pub use queue::{DelayQueue, JobQueue};
pub use recovery::recover_unfinished;

// Re-export crossbeam_channel for use in main
pub use crossbeam_channel;
