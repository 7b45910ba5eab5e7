//! Lecture operations on behalf of a user: upload, listing, polling and
//! the study-material view, deletion and reprocessing.
//!
//! This is the only place jobs are created. Every user-input problem is
//! rejected here, synchronously, before anything is stored or enqueued.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::UploadConfig;
use crate::db::lecture_repo::{self, LectureRow};
use crate::db::{artifact_repo, Database, DatabaseError};
use crate::error::{StorageError, WorkerError};
use crate::lecture::artifacts::{Flashcard, Mcq, Resource, Transcript};
use crate::lecture::model::{Lecture, LectureStatus, LectureStatusView};
use crate::sanitize::clip_chars;
use crate::storage::StorageLocator;
use crate::worker::{JobQueue, PipelineJob};

const MAX_TITLE_CHARS: usize = 200;
const DEFAULT_TITLE: &str = "Untitled Lecture";
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unsupported file type '{extension}'. Allowed: {allowed}")]
    UnsupportedExtension { extension: String, allowed: String },

    #[error("Uploaded file is empty")]
    Empty,

    #[error("File too large ({size} bytes). Maximum is {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("Failed to store audio: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum LectureError {
    #[error("Lecture not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to enqueue processing: {0}")]
    Queue(#[from] WorkerError),
}

/// A lecture with everything the pipeline produced for it.
#[derive(Debug, Clone, Serialize)]
pub struct LectureDetail {
    pub lecture: Lecture,
    pub transcript: Option<Transcript>,
    pub notes: Option<String>,
    pub key_concepts: Vec<String>,
    pub flashcards: Vec<Flashcard>,
    pub mcqs: Vec<Mcq>,
    pub resources: Vec<Resource>,
}

#[derive(Clone)]
pub struct LectureService {
    db: Database,
    locator: StorageLocator,
    queue: Arc<dyn JobQueue>,
    upload: UploadConfig,
}

impl LectureService {
    pub fn new(
        db: Database,
        locator: StorageLocator,
        queue: Arc<dyn JobQueue>,
        upload: UploadConfig,
    ) -> Self {
        Self {
            db,
            locator,
            queue,
            upload,
        }
    }

    /// Validates and stores an upload, records the lecture in UPLOADING and
    /// enqueues its first run.
    ///
    /// The lecture row is kept if enqueueing fails; startup recovery picks
    /// it up.
    pub fn upload(
        &self,
        user_id: &str,
        filename: &str,
        title: Option<&str>,
        content: &[u8],
    ) -> Result<Lecture, UploadError> {
        let extension = self.check_extension(filename)?;
        if content.is_empty() {
            return Err(UploadError::Empty);
        }
        let size = content.len() as u64;
        if size > self.upload.max_file_size_bytes {
            return Err(UploadError::TooLarge {
                size,
                max: self.upload.max_file_size_bytes,
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        let storage_key = self.locator.store(content, &id, &extension)?;

        let row = LectureRow {
            id: id.clone(),
            user_id: user_id.to_string(),
            title: lecture_title(title, filename),
            storage_key: storage_key.clone(),
            status: LectureStatus::Uploading.as_str().to_string(),
            progress: 0,
            duration: None,
            error_message: None,
            uploaded_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            processed_at: None,
            generation: 1,
        };
        if let Err(e) = lecture_repo::insert(&self.db, &row) {
            self.locator.erase(&storage_key);
            return Err(e.into());
        }

        if let Err(e) = self.queue.enqueue(PipelineJob::new(&id, row.generation)) {
            log::error!("Lecture {} stored but not enqueued: {}", id, e);
        } else {
            log::info!("Lecture {} uploaded ({} bytes), queued for processing", id, size);
        }

        Ok(Lecture::try_from(row)?)
    }

    /// A user's lectures, newest first. Pages start at 1; the page size is
    /// capped at [`MAX_PAGE_SIZE`].
    pub fn list(&self, user_id: &str, page: u32, limit: u32) -> Result<Vec<Lecture>, LectureError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let offset = page.max(1).saturating_sub(1).saturating_mul(limit);
        lecture_repo::list_by_user(&self.db, user_id, limit, offset)?
            .into_iter()
            .map(|row| Lecture::try_from(row).map_err(LectureError::from))
            .collect()
    }

    pub fn get(&self, user_id: &str, lecture_id: &str) -> Result<Lecture, LectureError> {
        let row = lecture_repo::find_owned(&self.db, lecture_id, user_id)?
            .ok_or_else(|| LectureError::NotFound(lecture_id.to_string()))?;
        Ok(Lecture::try_from(row)?)
    }

    pub fn status(&self, user_id: &str, lecture_id: &str) -> Result<LectureStatusView, LectureError> {
        let lecture = self.get(user_id, lecture_id)?;
        Ok(LectureStatusView::from(&lecture))
    }

    pub fn detail(&self, user_id: &str, lecture_id: &str) -> Result<LectureDetail, LectureError> {
        let lecture = self.get(user_id, lecture_id)?;
        let note = artifact_repo::note_for(&self.db, lecture_id)?;
        let (notes, key_concepts) = match note {
            Some(note) => (Some(note.content), note.key_concepts),
            None => (None, Vec::new()),
        };

        Ok(LectureDetail {
            transcript: artifact_repo::transcript_for(&self.db, lecture_id)?,
            notes,
            key_concepts,
            flashcards: artifact_repo::flashcards_for(&self.db, lecture_id)?,
            mcqs: artifact_repo::mcqs_for(&self.db, lecture_id)?,
            resources: artifact_repo::resources_for(&self.db, lecture_id)?,
            lecture,
        })
    }

    /// Deletes the stored audio (best effort) and the lecture with all its
    /// artifacts.
    pub fn delete(&self, user_id: &str, lecture_id: &str) -> Result<(), LectureError> {
        let lecture = self.get(user_id, lecture_id)?;
        self.locator.erase(&lecture.storage_key);
        lecture_repo::delete(&self.db, lecture_id)?;
        log::info!("Lecture {} deleted", lecture_id);
        Ok(())
    }

    /// Starts a fresh run under a new generation. Any run still in flight
    /// for the old generation stops at its next checkpoint.
    pub fn reprocess(&self, user_id: &str, lecture_id: &str) -> Result<Lecture, LectureError> {
        self.get(user_id, lecture_id)?;
        let generation = lecture_repo::bump_generation(&self.db, lecture_id)?
            .ok_or_else(|| LectureError::NotFound(lecture_id.to_string()))?;

        self.queue
            .enqueue(PipelineJob::new(lecture_id, generation))?;
        log::info!(
            "Lecture {} queued for reprocessing (generation {})",
            lecture_id,
            generation
        );
        self.get(user_id, lecture_id)
    }

    fn check_extension(&self, filename: &str) -> Result<String, UploadError> {
        let extension = split_extension(filename)
            .1
            .map(str::to_lowercase)
            .unwrap_or_default();

        if extension.is_empty() || !self.upload.allowed_extensions.contains(&extension) {
            return Err(UploadError::UnsupportedExtension {
                extension,
                allowed: self.upload.allowed_extensions.join(", "),
            });
        }
        Ok(extension)
    }
}

/// Splits a file name at its last dot. `.mp3` has an empty stem and the
/// extension `mp3`; a name without a dot has no extension.
fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rsplit_once('.') {
        Some((stem, extension)) => (stem, Some(extension)),
        None => (filename, None),
    }
}

/// The supplied title, or the file name without its extension.
fn lecture_title(title: Option<&str>, filename: &str) -> String {
    let stem = split_extension(filename).0;
    let chosen = title.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(stem);
    let clipped = clip_chars(chosen.trim(), MAX_TITLE_CHARS).trim();
    if clipped.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        clipped.to_string()
    }
}
