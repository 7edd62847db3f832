//! In-memory blob container for tests and local development.

use crate::blob_storage::BlobContainer;
use crate::error::MessagingError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(test)]
#[path = "memory_blob_tests.rs"]
mod tests;

/// Volatile blob container backed by a sorted map.
///
/// Clones share the same underlying storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobContainer {
    blobs: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl InMemoryBlobContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobContainer for InMemoryBlobContainer {
    async fn open_write(&self, key: &str, content: Bytes) -> Result<(), MessagingError> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), content);
        Ok(())
    }

    async fn open_read(&self, key: &str) -> Result<Bytes, MessagingError> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| MessagingError::BlobNotFound {
                key: key.to_string(),
            })
    }

    async fn delete(&self, key: &str) -> Result<(), MessagingError> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| MessagingError::BlobNotFound {
                key: key.to_string(),
            })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, MessagingError> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
