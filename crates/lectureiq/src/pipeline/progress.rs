//! Progress persistence for a single pipeline run.
//!
//! [`ProgressTracker`] is the only writer of a lecture's status, progress,
//! error message, processing timestamp and duration. Each checkpoint is one
//! SQLite transaction holding the guarded lecture update together with the
//! stage's artifact rows. The guard matches on the run's generation, so a
//! run that has been superseded by a reprocess can no longer write.

use rusqlite::Connection;
use thiserror::Error;

use crate::db::{lecture_repo, Database, DatabaseError};

use super::checkpoint::Checkpoint;

/// Events emitted after a checkpoint or failure has been committed.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Checkpoint {
        lecture_id: String,
        checkpoint: Checkpoint,
    },
    Failed {
        lecture_id: String,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Reporter used by the workers: every committed event becomes a log line.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Checkpoint {
                lecture_id,
                checkpoint,
            } => {
                tracing::debug!(
                    lecture_id = %lecture_id,
                    progress = checkpoint.progress(),
                    "Checkpoint {}",
                    checkpoint.label()
                );
            }
            ProgressEvent::Failed { lecture_id, error } => {
                tracing::debug!(lecture_id = %lecture_id, error = %error, "Lecture marked failed");
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("lecture {0} no longer exists")]
    Vanished(String),

    #[error("run generation {stale} was superseded by generation {current}")]
    Superseded { stale: u32, current: u32 },

    #[error("checkpoint {next} cannot follow {last:?}")]
    OutOfOrder {
        last: Option<Checkpoint>,
        next: Checkpoint,
    },

    #[error("run already finished")]
    Closed,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ProgressError {
    /// The run lost its lecture: retrying would not help.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            ProgressError::Vanished(_) | ProgressError::Superseded { .. }
        )
    }
}

enum Guarded {
    Applied,
    Vanished,
    Superseded(u32),
}

pub struct ProgressTracker<'a> {
    db: &'a Database,
    lecture_id: &'a str,
    generation: u32,
    reporter: &'a dyn ProgressReporter,
    last: Option<Checkpoint>,
    closed: bool,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(
        db: &'a Database,
        lecture_id: &'a str,
        generation: u32,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            db,
            lecture_id,
            generation,
            reporter,
            last: None,
            closed: false,
        }
    }

    pub fn lecture_id(&self) -> &str {
        self.lecture_id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn last(&self) -> Option<Checkpoint> {
        self.last
    }

    /// Enters PROCESSING at the first checkpoint, clearing the error and
    /// timestamp a previous run may have left.
    pub fn begin(&mut self) -> Result<(), ProgressError> {
        let (id, generation) = (self.lecture_id, self.generation);
        self.advance(
            Checkpoint::Started,
            |conn| {
                lecture_repo::begin_run(conn, id, generation, Checkpoint::Started.progress())
            },
            |_| Ok(()),
        )
    }

    /// Commits an intermediate checkpoint together with `write`, which
    /// persists the stage's output inside the same transaction.
    pub fn checkpoint<F>(&mut self, checkpoint: Checkpoint, write: F) -> Result<(), ProgressError>
    where
        F: FnOnce(&Connection) -> Result<(), DatabaseError>,
    {
        if matches!(checkpoint, Checkpoint::Started | Checkpoint::Completed) {
            return Err(ProgressError::OutOfOrder {
                last: self.last,
                next: checkpoint,
            });
        }
        let (id, generation) = (self.lecture_id, self.generation);
        self.advance(
            checkpoint,
            |conn| lecture_repo::set_progress(conn, id, generation, checkpoint.progress()),
            write,
        )
    }

    /// Marks the lecture COMPLETED at 100%.
    pub fn complete(&mut self) -> Result<(), ProgressError> {
        let (id, generation) = (self.lecture_id, self.generation);
        let processed_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        self.advance(
            Checkpoint::Completed,
            |conn| lecture_repo::mark_completed(conn, id, generation, &processed_at),
            |_| Ok(()),
        )?;
        self.closed = true;
        Ok(())
    }

    /// Marks the lecture FAILED. Progress stays at the last checkpoint.
    pub fn fail(&mut self, message: &str) -> Result<(), ProgressError> {
        if self.closed {
            return Err(ProgressError::Closed);
        }
        let (id, generation) = (self.lecture_id, self.generation);
        self.guarded(
            |conn| lecture_repo::mark_failed(conn, id, generation, message),
            |_| Ok(()),
        )?;
        self.closed = true;

        self.reporter.report(ProgressEvent::Failed {
            lecture_id: self.lecture_id.to_string(),
            error: message.to_string(),
        });
        Ok(())
    }

    fn advance<G, F>(&mut self, next: Checkpoint, guard: G, write: F) -> Result<(), ProgressError>
    where
        G: FnOnce(&Connection) -> Result<usize, DatabaseError>,
        F: FnOnce(&Connection) -> Result<(), DatabaseError>,
    {
        if self.closed {
            return Err(ProgressError::Closed);
        }
        let expected = match self.last {
            None => Some(Checkpoint::Started),
            Some(last) => last.next(),
        };
        if expected != Some(next) {
            return Err(ProgressError::OutOfOrder {
                last: self.last,
                next,
            });
        }

        self.guarded(guard, write)?;
        self.last = Some(next);

        self.reporter.report(ProgressEvent::Checkpoint {
            lecture_id: self.lecture_id.to_string(),
            checkpoint: next,
        });
        Ok(())
    }

    fn guarded<G, F>(&self, guard: G, write: F) -> Result<(), ProgressError>
    where
        G: FnOnce(&Connection) -> Result<usize, DatabaseError>,
        F: FnOnce(&Connection) -> Result<(), DatabaseError>,
    {
        let outcome = self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            if guard(&tx)? == 0 {
                // Dropping `tx` rolls back.
                return Ok(match lecture_repo::generation_of(&tx, self.lecture_id)? {
                    Some(current) => Guarded::Superseded(current),
                    None => Guarded::Vanished,
                });
            }
            write(&tx)?;
            tx.commit()?;
            Ok(Guarded::Applied)
        })?;

        match outcome {
            Guarded::Applied => Ok(()),
            Guarded::Vanished => Err(ProgressError::Vanished(self.lecture_id.to_string())),
            Guarded::Superseded(current) => Err(ProgressError::Superseded {
                stale: self.generation,
                current,
            }),
        }
    }
}
