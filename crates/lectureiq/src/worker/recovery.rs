use log::{info, warn};

use crate::db::{lecture_repo, Database};
use crate::error::Result;
use crate::worker::job::PipelineJob;
use crate::worker::queue::JobQueue;

/// Re-enqueues every lecture left in `uploading` or `processing` by a
/// previous process. Jobs carry the stored generation so a reprocess that
/// raced the restart still wins.
///
/// Returns the number of jobs enqueued.
pub fn recover_unfinished(db: &Database, queue: &dyn JobQueue) -> Result<usize> {
    let pending = lecture_repo::find_unfinished(db)?;
    if pending.is_empty() {
        return Ok(0);
    }

    info!("Recovering {} unfinished lecture(s)", pending.len());

    for row in &pending {
        if row.status == "processing" {
            warn!(
                "Lecture {} was interrupted at {}%; restarting",
                row.id, row.progress
            );
        }
        queue.enqueue(PipelineJob::new(row.id.clone(), row.generation))?;
    }

    Ok(pending.len())
}
