use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::progress::{LogProgress, ProgressReporter};
use crate::pipeline::{Pipeline, RunOutcome};
use crate::worker::job::{JobResult, PipelineJob};
use crate::worker::queue::JobQueue;

pub struct WorkerPool {
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` threads pulling from `jobs`. Failed runs that
    /// should be retried are put back through `queue`.
    pub fn new(
        pipeline: Arc<Pipeline>,
        queue: Arc<dyn JobQueue>,
        jobs: Receiver<PipelineJob>,
        worker_count: usize,
    ) -> Result<Self, WorkerError> {
        Self::with_reporter(pipeline, queue, jobs, worker_count, Arc::new(LogProgress))
    }

    pub fn with_reporter(
        pipeline: Arc<Pipeline>,
        queue: Arc<dyn JobQueue>,
        jobs: Receiver<PipelineJob>,
        worker_count: usize,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }
        let (result_sender, result_receiver) = bounded::<JobResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let worker = Worker {
                id: worker_id,
                jobs: jobs.clone(),
                results: result_sender.clone(),
                shutdown: Arc::clone(&shutdown),
                pipeline: Arc::clone(&pipeline),
                queue: Arc::clone(&queue),
                reporter: Arc::clone(&reporter),
            };

            let spawned = thread::Builder::new()
                .name(format!("lectureiq-worker-{}", worker_id))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shutdown.store(true, Ordering::Relaxed);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(WorkerError::SpawnFailed(e.to_string()));
                }
            }
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            result_receiver,
            workers,
            shutdown,
        })
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<JobResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Workers may be blocked sending a result; keep draining until they exit.
        let results = self.result_receiver;
        for (i, worker) in self.workers.into_iter().enumerate() {
            while !worker.is_finished() {
                let _ = results.recv_timeout(Duration::from_millis(50));
            }
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

struct Worker {
    id: usize,
    jobs: Receiver<PipelineJob>,
    results: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
    queue: Arc<dyn JobQueue>,
    reporter: Arc<dyn ProgressReporter>,
}

impl Worker {
    fn run(self) {
        debug!("Worker {} started", self.id);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!("Worker {} received shutdown signal", self.id);
                break;
            }

            match self.jobs.recv_timeout(Duration::from_millis(100)) {
                Ok(job) => {
                    debug!(
                        "Worker {} processing lecture {} (attempt {})",
                        self.id, job.lecture_id, job.attempt
                    );

                    let outcome = self.pipeline.run(&job, self.reporter.as_ref());

                    if let RunOutcome::Retry { job: next, delay, .. } = &outcome {
                        if let Err(e) = self.queue.enqueue_after(next.clone(), *delay) {
                            error!(
                                "Worker {} could not schedule retry of lecture {}: {}",
                                self.id, next.lecture_id, e
                            );
                        }
                    }

                    let result = JobResult::from_outcome(&job, &outcome);
                    if let Err(e) = self.results.send(result) {
                        error!("Worker {} failed to send result: {}", self.id, e);
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Worker {} job channel disconnected", self.id);
                    break;
                }
            }
        }

        debug!("Worker {} stopped", self.id);
    }
}
