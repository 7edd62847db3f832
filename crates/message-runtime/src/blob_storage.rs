//! # Blob Storage Interface
//!
//! Key-addressed byte storage used by the large-payload offload interceptors.

use crate::error::MessagingError;
use async_trait::async_trait;
use bytes::Bytes;

/// Interface for blob container operations
///
/// Keys are opaque strings chosen by the caller. Writing an existing key
/// replaces its content.
///
/// # Examples
///
/// ```
/// use message_runtime::blob_storage::BlobContainer;
/// use message_runtime::adapters::InMemoryBlobContainer;
/// use bytes::Bytes;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), message_runtime::MessagingError> {
/// let container = InMemoryBlobContainer::new();
/// container.open_write("payloads/1", Bytes::from("large body")).await?;
///
/// let content = container.open_read("payloads/1").await?;
/// assert_eq!(content, Bytes::from("large body"));
///
/// container.delete("payloads/1").await?;
/// assert!(container.list("payloads/").await?.is_empty());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait BlobContainer: Send + Sync {
    /// Store content under the given key
    async fn open_write(&self, key: &str, content: Bytes) -> Result<(), MessagingError>;

    /// Read the content stored under the given key
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::BlobNotFound`] if no blob exists for the key.
    async fn open_read(&self, key: &str) -> Result<Bytes, MessagingError>;

    /// Remove the blob stored under the given key
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::BlobNotFound`] if no blob exists for the key.
    async fn delete(&self, key: &str) -> Result<(), MessagingError>;

    /// Keys starting with `prefix`, in ascending order
    async fn list(&self, prefix: &str) -> Result<Vec<String>, MessagingError>;
}
