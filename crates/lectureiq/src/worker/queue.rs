//! In-process job queue with delayed delivery.
//!
//! Ready jobs go straight onto an unbounded channel that the worker pool
//! reads. Delayed jobs are handed to a scheduler thread that holds them in
//! a min-heap keyed by due time and forwards each one when it falls due.
//! Nothing is persisted: jobs still waiting when the queue is dropped are
//! lost, and startup recovery re-enqueues unfinished lectures.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error};

use crate::error::WorkerError;
use crate::worker::job::PipelineJob;

/// Producer side of the job queue.
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: PipelineJob) -> Result<(), WorkerError>;

    fn enqueue_after(&self, job: PipelineJob, delay: Duration) -> Result<(), WorkerError>;
}

struct Scheduled {
    due: Instant,
    seq: u64,
    job: PipelineJob,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap pops the earliest due job first.
impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct DelayQueue {
    ready_sender: Sender<PipelineJob>,
    ready_receiver: Receiver<PipelineJob>,
    delayed_sender: Mutex<Option<Sender<(Instant, PipelineJob)>>>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl DelayQueue {
    pub fn new() -> Result<Self, WorkerError> {
        let (ready_sender, ready_receiver) = unbounded::<PipelineJob>();
        let (delayed_sender, delayed_receiver) = unbounded::<(Instant, PipelineJob)>();

        let forward = ready_sender.clone();
        let scheduler = thread::Builder::new()
            .name("lectureiq-scheduler".to_string())
            .spawn(move || run_scheduler(delayed_receiver, forward))
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        Ok(Self {
            ready_sender,
            ready_receiver,
            delayed_sender: Mutex::new(Some(delayed_sender)),
            scheduler: Mutex::new(Some(scheduler)),
        })
    }

    /// Consumer side, for the worker pool. Every clone competes for jobs.
    pub fn receiver(&self) -> Receiver<PipelineJob> {
        self.ready_receiver.clone()
    }

    /// Jobs ready to run but not yet picked up.
    pub fn ready_len(&self) -> usize {
        self.ready_receiver.len()
    }

    /// Stops the scheduler. Delayed jobs that have not fallen due are
    /// dropped; ready jobs stay on the channel.
    pub fn close(&self) {
        if let Ok(mut sender) = self.delayed_sender.lock() {
            sender.take();
        }
        let handle = self.scheduler.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Job scheduler panicked");
            }
        }
    }
}

impl JobQueue for DelayQueue {
    fn enqueue(&self, job: PipelineJob) -> Result<(), WorkerError> {
        debug!(
            "Enqueued lecture {} (generation {}, attempt {})",
            job.lecture_id, job.generation, job.attempt
        );
        self.ready_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    fn enqueue_after(&self, job: PipelineJob, delay: Duration) -> Result<(), WorkerError> {
        if delay.is_zero() {
            return self.enqueue(job);
        }

        let sender = self
            .delayed_sender
            .lock()
            .map_err(|_| WorkerError::ChannelClosed)?;
        let sender = sender.as_ref().ok_or(WorkerError::ChannelClosed)?;

        debug!(
            "Scheduled lecture {} attempt {} in {:?}",
            job.lecture_id, job.attempt, delay
        );
        let due = Instant::now()
            .checked_add(delay)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400 * 365));
        sender
            .send((due, job))
            .map_err(|_| WorkerError::ChannelClosed)
    }
}

impl Drop for DelayQueue {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_scheduler(incoming: Receiver<(Instant, PipelineJob)>, ready: Sender<PipelineJob>) {
    debug!("Job scheduler started");
    let mut pending: BinaryHeap<Scheduled> = BinaryHeap::new();
    let mut seq: u64 = 0;

    loop {
        let now = Instant::now();
        while pending.peek().is_some_and(|next| next.due <= now) {
            if let Some(next) = pending.pop() {
                if ready.send(next.job).is_err() {
                    debug!("Ready channel closed; scheduler exiting");
                    return;
                }
            }
        }

        let received = match pending.peek() {
            Some(next) => incoming.recv_timeout(next.due.saturating_duration_since(now)),
            None => incoming.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok((due, job)) => {
                seq += 1;
                pending.push(Scheduled { due, seq, job });
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if !pending.is_empty() {
        debug!("Job scheduler stopped with {} delayed jobs pending", pending.len());
    }
}
