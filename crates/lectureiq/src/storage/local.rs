use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::{Fetched, StorageBackend};

/// Keeps audio in a directory on the worker's own filesystem. Storage keys
/// are absolute paths.
pub struct LocalBackend {
    upload_directory: PathBuf,
}

impl LocalBackend {
    pub fn new<P: AsRef<Path>>(upload_directory: P) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
        }
    }

    fn ensure_directory(&self) -> Result<(), StorageError> {
        if !self.upload_directory.exists() {
            std::fs::create_dir_all(&self.upload_directory).map_err(|e| {
                StorageError::CreateDirectory {
                    path: self.upload_directory.clone(),
                    source: e,
                }
            })?;
        }
        Ok(())
    }

    /// Creates `{stem}.{ext}` exclusively, falling back to numbered variants
    /// if an earlier upload already claimed the name.
    fn create_exclusive(&self, stem: &str, extension: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        for counter in 1..=1000 {
            let filename = if counter == 1 {
                format!("{}.{}", stem, extension)
            } else {
                format!("{}_{}.{}", stem, counter, extension)
            };
            let path = self.upload_directory.join(&filename);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
                        // Don't leave a truncated upload behind.
                        let _ = std::fs::remove_file(&path);
                        return Err(StorageError::WriteFile { path, source: e });
                    }
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::WriteFile { path, source: e }),
            }
        }

        Err(StorageError::FileExists(
            self.upload_directory
                .join(format!("{}.{}", stem, extension)),
        ))
    }
}

impl StorageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn put(
        &self,
        lecture_id: &str,
        extension: &str,
        content: &[u8],
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.ensure_directory()?;
        let path = self.create_exclusive(lecture_id, extension, content)?;
        let absolute = std::fs::canonicalize(&path).map_err(|e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        log::info!("Saved audio locally: {}", absolute.display());
        Ok(absolute.to_string_lossy().into_owned())
    }

    fn fetch(&self, key: &str) -> Result<Fetched, StorageError> {
        let path = Path::new(key);
        if !path.is_absolute() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        if !path.is_file() {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(Fetched::Local(path.to_path_buf()))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        delete_local(key)
    }
}

/// Removes a local audio file. A file that is already gone is not an error.
/// Relative keys never name local audio and are rejected.
pub(crate) fn delete_local(key: &str) -> Result<(), StorageError> {
    if !Path::new(key).is_absolute() {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    match std::fs::remove_file(key) {
        Ok(()) => {
            log::info!("Deleted local audio: {}", key);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::Delete {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_returns_absolute_key() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().join("uploads"));

        let key = backend.put("abc", "mp3", b"ID3", "audio/mpeg").unwrap();
        let path = Path::new(&key);
        assert!(path.is_absolute());
        assert!(key.ends_with("abc.mp3"));
        assert_eq!(std::fs::read(path).unwrap(), b"ID3");
    }

    #[test]
    fn test_put_does_not_overwrite() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());

        let first = backend.put("abc", "wav", b"one", "audio/wav").unwrap();
        let second = backend.put("abc", "wav", b"two", "audio/wav").unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("abc_2.wav"));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
    }

    #[test]
    fn test_fetch_existing_is_not_staged() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());
        let key = backend.put("abc", "ogg", b"OggS", "audio/ogg").unwrap();

        match backend.fetch(&key).unwrap() {
            Fetched::Local(path) => assert_eq!(path, PathBuf::from(&key)),
            Fetched::Staged(_) => panic!("local audio must not be staged"),
        }
    }

    #[test]
    fn test_fetch_missing() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());
        let key = temp.path().join("missing.mp3");

        let result = backend.fetch(key.to_str().unwrap());
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn test_fetch_relative_key_is_invalid() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());

        let result = backend.fetch("lectures/abc.mp3");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());
        let key = backend.put("abc", "flac", b"fLaC", "audio/flac").unwrap();

        backend.delete(&key).unwrap();
        assert!(!Path::new(&key).exists());
        backend.delete(&key).unwrap();
    }

    #[test]
    fn test_delete_relative_key_is_invalid() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path());

        let result = backend.delete("lectures/abc.mp3");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
