//! # Filesystem Blob Container Adapter
//!
//! Local filesystem implementation of [`BlobContainer`] for development and
//! single-host deployments.

use crate::blob_storage::BlobContainer;
use crate::error::{MessagingError, ValidationError};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[cfg(test)]
#[path = "filesystem_blob_tests.rs"]
mod tests;

/// Filesystem-based blob container
///
/// Each blob is stored as one file below the base directory. Keys use `/` as
/// the segment separator; every segment becomes a directory level.
///
/// # Examples
///
/// ```no_run
/// use message_runtime::adapters::FilesystemBlobContainer;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), message_runtime::MessagingError> {
/// let container = FilesystemBlobContainer::new(PathBuf::from("./data/blobs")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemBlobContainer {
    base_path: PathBuf,
}

impl FilesystemBlobContainer {
    /// Create new filesystem blob container
    ///
    /// # Errors
    ///
    /// Returns error if the base directory cannot be created.
    pub async fn new(base_path: PathBuf) -> Result<Self, MessagingError> {
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| MessagingError::BlobStorage {
                message: format!("Failed to create base directory: {}", e),
            })?;

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a key onto a path below the base directory.
    ///
    /// Segments must be non-empty and must not start with `.`, which keeps
    /// every blob inside the base directory and reserves dot-files for
    /// in-progress writes.
    fn blob_path(&self, key: &str) -> Result<PathBuf, MessagingError> {
        let mut path = self.base_path.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment.starts_with('.') || segment.contains('\\') {
                return Err(ValidationError::InvalidFormat {
                    field: "key".to_string(),
                    message: format!("'{}' is not a valid blob key", key),
                }
                .into());
            }
            path.push(segment);
        }
        Ok(path)
    }
}

fn not_found_or(key: &str, action: &str, e: std::io::Error) -> MessagingError {
    if e.kind() == ErrorKind::NotFound {
        MessagingError::BlobNotFound {
            key: key.to_string(),
        }
    } else {
        MessagingError::BlobStorage {
            message: format!("Failed to {} blob '{}': {}", action, key, e),
        }
    }
}

#[async_trait]
impl BlobContainer for FilesystemBlobContainer {
    async fn open_write(&self, key: &str, content: Bytes) -> Result<(), MessagingError> {
        let blob_path = self.blob_path(key)?;

        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MessagingError::BlobStorage {
                    message: format!("Failed to create directory structure: {}", e),
                })?;
        }

        // Write to a hidden temporary file first, then rename into place
        let file_name = blob_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let temp_path = blob_path.with_file_name(format!(
            ".{}.{}.tmp",
            file_name,
            uuid::Uuid::new_v4()
        ));

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| MessagingError::BlobStorage {
                message: format!("Failed to create temp file: {}", e),
            })?;

        let written = async {
            file.write_all(&content).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(MessagingError::BlobStorage {
                message: format!("Failed to write blob '{}': {}", key, e),
            });
        }

        if let Err(e) = fs::rename(&temp_path, &blob_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(MessagingError::BlobStorage {
                message: format!("Failed to rename temp file: {}", e),
            });
        }

        debug!(key, size_bytes = content.len(), "Stored blob");
        Ok(())
    }

    async fn open_read(&self, key: &str) -> Result<Bytes, MessagingError> {
        let blob_path = self.blob_path(key)?;
        let content = fs::read(&blob_path)
            .await
            .map_err(|e| not_found_or(key, "read", e))?;
        Ok(Bytes::from(content))
    }

    async fn delete(&self, key: &str) -> Result<(), MessagingError> {
        let blob_path = self.blob_path(key)?;
        fs::remove_file(&blob_path)
            .await
            .map_err(|e| not_found_or(key, "delete", e))?;

        debug!(key, "Deleted blob");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, MessagingError> {
        let mut keys = Vec::new();

        // Walk the directory tree, tracking each directory's key prefix
        let mut pending = vec![(self.base_path.clone(), String::new())];
        while let Some((dir, dir_key)) = pending.pop() {
            let mut read_dir = match fs::read_dir(&dir).await {
                Ok(read_dir) => read_dir,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(MessagingError::BlobStorage {
                        message: format!("Failed to read directory: {}", e),
                    })
                }
            };

            while let Some(entry) =
                read_dir
                    .next_entry()
                    .await
                    .map_err(|e| MessagingError::BlobStorage {
                        message: format!("Failed to read directory entry: {}", e),
                    })?
            {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                if name.starts_with('.') {
                    continue;
                }

                let key = if dir_key.is_empty() {
                    name
                } else {
                    format!("{}/{}", dir_key, name)
                };

                let file_type =
                    entry
                        .file_type()
                        .await
                        .map_err(|e| MessagingError::BlobStorage {
                            message: format!("Failed to read directory entry: {}", e),
                        })?;

                if file_type.is_dir() {
                    pending.push((entry.path(), key));
                } else if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
