//! Process-wide logging setup.
//!
//! Library code logs through both `log` (db, storage, worker) and `tracing`
//! (pipeline, services). [`init_logging`] bridges the former into the latter
//! and installs a single fmt subscriber.

use thiserror::Error;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Failed to install logger: {0}")]
    Install(String),
}

/// `RUST_LOG` wins over the configured level when set and valid.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_for(&config.level)?,
    };

    tracing_log::LogTracer::init().map_err(|e| TelemetryError::Install(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr).with_target(true)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true),
            ),
        ),
    };

    installed.map_err(|e| TelemetryError::Install(e.to_string()))
}

fn filter_for(level: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(level).map_err(|e| TelemetryError::Filter {
        filter: level.to_string(),
        reason: e.to_string(),
    })
}
