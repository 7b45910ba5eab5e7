//! Test harness for isolated pipeline runs.
//!
//! The `TestHarness` owns a temp directory with separate upload and
//! staging areas plus an in-memory database, and wires fakes into a real
//! `Pipeline`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use lectureiq::db::lecture_repo::{self, LectureRow};
use lectureiq::db::Database;
use lectureiq::pipeline::{Pipeline, PipelineConfig, RetryPolicy, Services};
use lectureiq::services::{ContentGenerator, LlmGenerator, ResourceLookup, Transcriber};
use lectureiq::storage::{LocalBackend, RemoteBackend, StorageLocator};

use super::fakes::{FakeLookup, MemoryObjectStore, RecordingProgress, ScriptedModel};

pub struct TestHarness {
    temp_dir: TempDir,
    /// Where the local backend keeps uploads.
    pub upload_dir: PathBuf,
    /// Where the remote backend stages downloads.
    pub staging_dir: PathBuf,
    pub db: Database,
    pub progress: Arc<RecordingProgress>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        let staging_dir = temp_dir.path().join("staging");
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");
        std::fs::create_dir_all(&staging_dir).expect("Failed to create staging dir");

        Self {
            temp_dir,
            upload_dir,
            staging_dir,
            db: Database::open_in_memory().expect("Failed to open database"),
            progress: Arc::new(RecordingProgress::default()),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn local_locator(&self) -> StorageLocator {
        StorageLocator::new(Arc::new(LocalBackend::new(&self.upload_dir)))
    }

    pub fn remote_locator(&self, store: Arc<MemoryObjectStore>) -> StorageLocator {
        StorageLocator::new(Arc::new(RemoteBackend::new(store, &self.staging_dir)))
    }

    /// Writes audio into the upload directory and returns its storage key.
    pub fn write_audio(&self, filename: &str, content: &[u8]) -> String {
        let path = self.upload_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write audio");
        path.to_string_lossy().to_string()
    }

    /// Inserts a lecture in `uploading` at generation 1.
    pub fn insert_lecture(&self, id: &str, storage_key: &str) -> LectureRow {
        let row = LectureRow {
            id: id.to_string(),
            user_id: "student-1".to_string(),
            title: format!("Lecture {id}"),
            storage_key: storage_key.to_string(),
            status: "uploading".to_string(),
            progress: 0,
            duration: None,
            error_message: None,
            uploaded_at: "2026-09-01T09:00:00.000000Z".to_string(),
            processed_at: None,
            generation: 1,
        };
        lecture_repo::insert(&self.db, &row).expect("Failed to insert lecture");
        row
    }

    pub fn lecture(&self, id: &str) -> LectureRow {
        lecture_repo::find_by_id(&self.db, id)
            .expect("Failed to read lecture")
            .expect("Lecture missing")
    }

    /// Files currently in the staging directory.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.staging_dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    /// Pipeline with a millisecond retry base so retry paths run fast.
    pub fn pipeline(
        &self,
        locator: StorageLocator,
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn ContentGenerator>,
        resources: Arc<dyn ResourceLookup>,
    ) -> Pipeline {
        let config = PipelineConfig {
            retry: RetryPolicy::new(3, Duration::from_millis(5)),
            ..PipelineConfig::default()
        };
        Pipeline::new(
            Arc::new(config),
            self.db.clone(),
            locator,
            Services {
                transcriber,
                generator,
                resources,
            },
        )
    }

    /// Local storage, the given transcriber, a well-formed model and an
    /// empty resource lookup.
    pub fn default_pipeline(&self, transcriber: Arc<dyn Transcriber>) -> Pipeline {
        self.pipeline(
            self.local_locator(),
            transcriber,
            Arc::new(LlmGenerator::new(Arc::new(ScriptedModel::well_formed()))),
            Arc::new(FakeLookup::returning(vec![])),
        )
    }
}
