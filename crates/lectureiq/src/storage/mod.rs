//! Audio storage.
//!
//! [`StorageLocator`] is the only thing the pipeline and the upload path
//! talk to. It turns a storage key into a readable local file and owns the
//! lifetime of any temp file it had to create for that.

pub mod local;
pub mod remote;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;

use crate::config::StorageConfig;
use crate::error::StorageError;

pub use local::LocalBackend;
pub use remote::{HttpObjectStore, ObjectStore, ObjectStoreError, RemoteBackend};

/// Result of fetching audio from a backend.
#[derive(Debug)]
pub enum Fetched {
    /// Already on local disk; owned by the backend.
    Local(PathBuf),
    /// Copied into a temp file that is deleted when dropped.
    Staged(TempPath),
}

pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Persists audio for a lecture and returns its storage key.
    fn put(
        &self,
        lecture_id: &str,
        extension: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;

    fn fetch(&self, key: &str) -> Result<Fetched, StorageError>;

    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Audio resolved to a local path. A staged copy is removed when this is
/// released or dropped; a local original is never touched.
#[derive(Debug)]
pub struct LocalAudio {
    path: PathBuf,
    staged: Option<TempPath>,
}

impl LocalAudio {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_staged(&self) -> bool {
        self.staged.is_some()
    }

    /// Deletes the staged copy now, reporting any error.
    pub fn release(self) -> std::io::Result<()> {
        match self.staged {
            Some(temp) => temp.close(),
            None => Ok(()),
        }
    }
}

impl From<Fetched> for LocalAudio {
    fn from(fetched: Fetched) -> Self {
        match fetched {
            Fetched::Local(path) => Self { path, staged: None },
            Fetched::Staged(temp) => Self {
                path: temp.to_path_buf(),
                staged: Some(temp),
            },
        }
    }
}

/// Keys that are absolute paths were written by a local backend, even when
/// the current backend is remote.
fn is_local_key(key: &str) -> bool {
    Path::new(key).is_absolute()
}

#[derive(Clone)]
pub struct StorageLocator {
    backend: Arc<dyn StorageBackend>,
}

impl StorageLocator {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Picks the remote backend when it is configured with a usable access
    /// token, the local upload directory otherwise.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        if let Some(remote) = &config.remote {
            let token = remote
                .access_token
                .resolve()
                .map_err(|e| StorageError::Configuration(e.to_string()))?;

            match token {
                Some(token) => {
                    let staging = config
                        .staging_directory
                        .as_ref()
                        .map(PathBuf::from)
                        .unwrap_or_else(std::env::temp_dir);
                    let store = HttpObjectStore::new(remote, token)?;
                    log::info!(
                        "Storage backend: remote (bucket: {}, staging: {})",
                        remote.bucket,
                        staging.display()
                    );
                    return Ok(Self::new(Arc::new(RemoteBackend::new(
                        Arc::new(store),
                        staging,
                    ))));
                }
                None => {
                    log::warn!(
                        "Remote storage configured without an access token; using local uploads"
                    );
                }
            }
        }

        log::info!(
            "Storage backend: local ({})",
            config.upload_directory
        );
        Ok(Self::new(Arc::new(LocalBackend::new(
            &config.upload_directory,
        ))))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Stores uploaded audio and returns the storage key to persist.
    pub fn store(
        &self,
        content: &[u8],
        lecture_id: &str,
        extension: &str,
    ) -> Result<String, StorageError> {
        let extension = extension.trim_start_matches('.').to_lowercase();
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StorageError::InvalidKey(format!("{}.{}", lecture_id, extension)));
        }
        let content_type = mime_guess::from_ext(&extension)
            .first_or_octet_stream()
            .to_string();

        self.backend
            .put(lecture_id, &extension, content, &content_type)
    }

    /// Resolves a storage key to a readable local file.
    pub fn resolve(&self, key: &str) -> Result<LocalAudio, StorageError> {
        if is_local_key(key) {
            let path = Path::new(key);
            if !path.is_file() {
                return Err(StorageError::NotFound {
                    key: key.to_string(),
                });
            }
            return Ok(LocalAudio {
                path: path.to_path_buf(),
                staged: None,
            });
        }

        self.backend.fetch(key).map(LocalAudio::from)
    }

    /// Releases resolved audio, logging rather than returning cleanup errors.
    pub fn release(&self, audio: LocalAudio) {
        let path = audio.path().to_path_buf();
        let staged = audio.is_staged();
        if let Err(e) = audio.release() {
            log::warn!("Failed to remove staged audio {}: {}", path.display(), e);
        } else if staged {
            log::debug!("Removed staged audio {}", path.display());
        }
    }

    /// Deletes stored audio. Failures are logged, never returned.
    pub fn erase(&self, key: &str) {
        let result = if is_local_key(key) {
            local::delete_local(key)
        } else {
            self.backend.delete(key)
        };
        if let Err(e) = result {
            log::warn!("Audio delete failed (non-fatal): {}", e);
        }
    }
}
