use std::time::Duration;

use crate::pipeline::RunOutcome;

/// One pipeline run for a lecture. Every retry restarts from the first
/// stage, so the job carries nothing but identity and attempt count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineJob {
    pub lecture_id: String,
    /// Run-generation token the lecture had when the job was enqueued.
    pub generation: u32,
    /// 0 for the first run, incremented on every retry.
    pub attempt: u32,
}

impl PipelineJob {
    pub fn new(lecture_id: impl Into<String>, generation: u32) -> Self {
        Self {
            lecture_id: lecture_id.into(),
            generation,
            attempt: 0,
        }
    }

    /// The same run, one attempt later.
    pub fn next_attempt(&self) -> Self {
        Self {
            lecture_id: self.lecture_id.clone(),
            generation: self.generation,
            attempt: self.attempt + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Completed { warnings: usize },
    RetryScheduled { delay: Duration },
    Failed,
    Dropped,
}

/// What a worker reports back after running a job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub lecture_id: String,
    pub generation: u32,
    pub attempt: u32,
    pub status: JobStatus,
    pub error: Option<String>,
}

impl JobResult {
    pub fn from_outcome(job: &PipelineJob, outcome: &RunOutcome) -> Self {
        let (status, error) = match outcome {
            RunOutcome::Completed { warnings } => (
                JobStatus::Completed {
                    warnings: warnings.len(),
                },
                None,
            ),
            RunOutcome::Retry { delay, error, .. } => (
                JobStatus::RetryScheduled { delay: *delay },
                Some(error.clone()),
            ),
            RunOutcome::Failed { error } => (JobStatus::Failed, Some(error.clone())),
            RunOutcome::Dropped { reason } => (JobStatus::Dropped, Some(reason.clone())),
        };

        Self {
            lecture_id: job.lecture_id.clone(),
            generation: job.generation,
            attempt: job.attempt,
            status,
            error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, JobStatus::RetryScheduled { .. })
    }
}
