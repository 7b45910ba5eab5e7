use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use lectureiq::config::Config;
use lectureiq::db::default_database_path;
use lectureiq::services::{ChatClient, LlmGenerator, ResourceLinker, WhisperCommand};
use lectureiq::{
    init_logging, load_config, recover_unfinished, ConfigError, Database, DelayQueue, JobResult,
    JobStatus, Pipeline, PipelineConfig, Services, StorageLocator, WorkerError, WorkerPool,
};

/// Background worker that turns uploaded lecture audio into study material.
#[derive(Parser, Debug)]
#[command(name = "lectureiq-worker", version, about)]
struct Cli {
    /// Path to the JSON config file. Built-in defaults are used when omitted.
    #[arg(short, long, env = "LECTUREIQ_CONFIG")]
    config: Option<PathBuf>,

    /// Number of pipeline workers (overrides `worker_count`).
    #[arg(short, long)]
    workers: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be installed yet.
            eprintln!("lectureiq-worker: {e}");
            error!("Worker exited with error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> lectureiq::Result<()> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if let Some(workers) = cli.workers {
        config.worker_count = workers;
    }

    init_logging(&config.logging)?;

    info!("Starting lectureiq worker v{}", env!("CARGO_PKG_VERSION"));

    let db_path = match &config.database_path {
        Some(path) => PathBuf::from(path),
        None => default_database_path().ok_or_else(|| ConfigError::Validation {
            message: "could not determine a database path; set database_path".to_string(),
        })?,
    };
    let db = Database::open(&db_path)?;

    let locator = StorageLocator::from_config(&config.storage)?;
    info!("Using {} audio storage", locator.backend_name());

    let services = Services {
        transcriber: Arc::new(WhisperCommand::from_config(&config.transcription)),
        generator: Arc::new(LlmGenerator::new(Arc::new(ChatClient::new(
            &config.generation,
        )?))),
        resources: Arc::new(ResourceLinker::from_config(&config.resources)?),
    };

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(PipelineConfig::from_config(&config)),
        db.clone(),
        locator,
        services,
    ));

    let queue = Arc::new(DelayQueue::new()?);
    let pool = WorkerPool::new(
        pipeline,
        queue.clone(),
        queue.receiver(),
        config.worker_count,
    )?;

    let recovered = recover_unfinished(&db, queue.as_ref())?;
    if recovered > 0 {
        info!("Re-enqueued {} lecture(s) from a previous run", recovered);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::Relaxed);
    })
    .map_err(|e| WorkerError::Signal(e.to_string()))?;

    info!("Worker ready; press Ctrl+C to stop");

    while !stop.load(Ordering::Relaxed) {
        if let Some(result) = pool.recv_result_timeout(Duration::from_millis(500)) {
            log_result(&result);
        }
    }

    info!("Shutdown requested");
    pool.shutdown();
    pool.wait();
    queue.close();

    let pending = queue.ready_len();
    if pending > 0 {
        warn!(
            "{} queued job(s) dropped; they will be recovered on next start",
            pending
        );
    }

    Ok(())
}

fn log_result(result: &JobResult) {
    match &result.status {
        JobStatus::Completed { warnings: 0 } => {
            info!(lecture_id = %result.lecture_id, "Lecture processed");
        }
        JobStatus::Completed { warnings } => {
            warn!(
                lecture_id = %result.lecture_id,
                warnings = *warnings,
                "Lecture processed with warnings"
            );
        }
        JobStatus::RetryScheduled { delay } => {
            warn!(
                lecture_id = %result.lecture_id,
                attempt = result.attempt,
                retry_in_secs = delay.as_secs(),
                error = result.error.as_deref().unwrap_or(""),
                "Processing failed; retry scheduled"
            );
        }
        JobStatus::Failed => {
            error!(
                lecture_id = %result.lecture_id,
                attempt = result.attempt,
                error = result.error.as_deref().unwrap_or(""),
                "Processing failed permanently"
            );
        }
        JobStatus::Dropped => {
            info!(
                lecture_id = %result.lecture_id,
                generation = result.generation,
                "Job dropped"
            );
        }
    }
}
