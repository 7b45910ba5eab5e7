//! Object-storage backend.
//!
//! Audio lives under `lectures/{id}.{ext}` in a bucket. Transcription needs
//! a real file, so `fetch` downloads the object into a fresh temp file in
//! the staging directory. A failed download drops the temp file before the
//! error is returned.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::config::RemoteStorageConfig;
use crate::error::StorageError;
use crate::sanitize::redact_url;
use crate::storage::{Fetched, StorageBackend};

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("object not found")]
    NotFound,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ObjectStoreError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| redact_url(u.as_str()));
        let e = e.without_url();
        match url {
            Some(url) => ObjectStoreError::Http(format!("{} ({})", e, url)),
            None => ObjectStoreError::Http(e.to_string()),
        }
    }
}

/// Byte transport to an object store.
pub trait ObjectStore: Send + Sync {
    fn put_object(&self, key: &str, body: &[u8], content_type: &str)
        -> Result<(), ObjectStoreError>;

    /// Streams the object into `dest`, returning the number of bytes written.
    fn download_to(&self, key: &str, dest: &mut dyn Write) -> Result<u64, ObjectStoreError>;

    fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError>;
}

/// Path-style HTTP object store: `{endpoint}/{bucket}/{key}` with a bearer
/// token.
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    token: SecretString,
    server_side_encryption: bool,
}

impl HttpObjectStore {
    pub fn new(config: &RemoteStorageConfig, token: SecretString) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            token,
            server_side_encryption: config.server_side_encryption,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

impl ObjectStore for HttpObjectStore {
    fn put_object(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let mut request = self
            .client
            .put(self.object_url(key))
            .bearer_auth(self.token.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body.to_vec());
        if self.server_side_encryption {
            request = request.header("x-amz-server-side-encryption", "AES256");
        }

        request.send()?.error_for_status()?;
        Ok(())
    }

    fn download_to(&self, key: &str, dest: &mut dyn Write) -> Result<u64, ObjectStoreError> {
        let response = self
            .client
            .get(self.object_url(key))
            .bearer_auth(self.token.expose_secret())
            .send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound);
        }
        let mut response = response.error_for_status()?;
        let written = std::io::copy(&mut response, dest)?;
        Ok(written)
    }

    fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        let response = self
            .client
            .delete(self.object_url(key))
            .bearer_auth(self.token.expose_secret())
            .send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        response.error_for_status()?;
        Ok(())
    }
}

pub struct RemoteBackend {
    store: Arc<dyn ObjectStore>,
    staging_directory: PathBuf,
}

impl RemoteBackend {
    pub fn new<P: AsRef<Path>>(store: Arc<dyn ObjectStore>, staging_directory: P) -> Self {
        Self {
            store,
            staging_directory: staging_directory.as_ref().to_path_buf(),
        }
    }
}

/// Object key for a lecture's audio.
pub fn object_key(lecture_id: &str, extension: &str) -> String {
    format!("lectures/{}.{}", lecture_id, extension)
}

impl StorageBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn put(
        &self,
        lecture_id: &str,
        extension: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let key = object_key(lecture_id, extension);
        self.store
            .put_object(&key, content, content_type)
            .map_err(|e| StorageError::Transfer {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        log::info!("Uploaded audio to object store: {}", key);
        Ok(key)
    }

    fn fetch(&self, key: &str) -> Result<Fetched, StorageError> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        std::fs::create_dir_all(&self.staging_directory).map_err(|e| StorageError::Staging {
            key: key.to_string(),
            dir: self.staging_directory.clone(),
            source: e,
        })?;

        let suffix = Path::new(key)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_else(|| ".mp3".to_string());

        let mut staged = tempfile::Builder::new()
            .prefix("lectureiq-")
            .suffix(&suffix)
            .tempfile_in(&self.staging_directory)
            .map_err(|e| StorageError::Staging {
                key: key.to_string(),
                dir: self.staging_directory.clone(),
                source: e,
            })?;

        // On any error below `staged` is dropped and its file removed.
        let written = match self.store.download_to(key, staged.as_file_mut()) {
            Ok(n) => n,
            Err(ObjectStoreError::NotFound) => {
                return Err(StorageError::NotFound {
                    key: key.to_string(),
                })
            }
            Err(e) => {
                log::error!("Download of {} failed: {}", key, e);
                return Err(StorageError::Transfer {
                    key: key.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        staged.as_file_mut().flush().map_err(|e| StorageError::Staging {
            key: key.to_string(),
            dir: self.staging_directory.clone(),
            source: e,
        })?;

        let path = staged.into_temp_path();
        log::info!("Staged {} ({} bytes) for processing", key, written);
        Ok(Fetched::Staged(path))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.store
            .delete_object(key)
            .map_err(|e| StorageError::Delete {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        log::info!("Deleted audio from object store: {}", key);
        Ok(())
    }
}
