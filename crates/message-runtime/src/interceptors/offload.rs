//! Large-payload offload interceptors.
//!
//! Content above a size threshold is moved to a [`BlobContainer`] and the
//! message carries a fixed-length marker instead:
//!
//! ```text
//! MessageRuntime.Storage.BlobKey:<36-character uuid>
//! ```
//!
//! Receivers treat any content of exactly [`MARKER_LENGTH`] bytes that starts
//! with the prefix and separator as a marker. A genuine payload of that exact
//! shape is indistinguishable from a marker.

use crate::blob_storage::BlobContainer;
use crate::client::{message_handler, MessageHandler, MessagePublisher, MessageReceiver};
use crate::config::OffloadConfig;
use crate::error::MessagingError;
use crate::interceptors::publish_failure::restore_originals;
use crate::message::Message;
use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "offload_tests.rs"]
mod tests;

/// Marker prefix, also the property key recording the storage key on
/// received messages
pub const STORAGE_KEY_PREFIX: &str = "MessageRuntime.Storage.BlobKey";

const SEPARATOR: u8 = b':';
const STORAGE_KEY_LENGTH: usize = 36;

/// Total marker length in bytes
pub const MARKER_LENGTH: usize = STORAGE_KEY_PREFIX.len() + 1 + STORAGE_KEY_LENGTH;

/// Build the marker content for a storage key
fn marker_for(key: &str) -> String {
    format!("{}{}{}", STORAGE_KEY_PREFIX, SEPARATOR as char, key)
}

/// Extract the storage key if `content` is a marker
pub fn parse_marker(content: &[u8]) -> Option<&str> {
    if content.len() != MARKER_LENGTH {
        return None;
    }

    let (prefix, rest) = content.split_at(STORAGE_KEY_PREFIX.len());
    if prefix != STORAGE_KEY_PREFIX.as_bytes() || rest[0] != SEPARATOR {
        return None;
    }

    std::str::from_utf8(&rest[1..]).ok()
}

/// Publisher that moves large content into a blob container
#[derive(Clone)]
pub struct LargePayloadPublisher {
    inner: Arc<dyn MessagePublisher>,
    container: Arc<dyn BlobContainer>,
    threshold_bytes: usize,
}

impl LargePayloadPublisher {
    /// Offload content strictly larger than `threshold_bytes`
    pub fn new(
        inner: Arc<dyn MessagePublisher>,
        container: Arc<dyn BlobContainer>,
        threshold_bytes: usize,
    ) -> Self {
        Self {
            inner,
            container,
            threshold_bytes,
        }
    }

    pub fn from_config(
        inner: Arc<dyn MessagePublisher>,
        container: Arc<dyn BlobContainer>,
        config: &OffloadConfig,
    ) -> Self {
        Self::new(inner, container, config.threshold_bytes)
    }

    /// Upload oversized content, returning the message to forward and the
    /// storage key when a blob was written
    async fn offload(
        &self,
        message: &Message,
    ) -> Result<(Message, Option<String>), MessagingError> {
        if message.content().len() <= self.threshold_bytes {
            return Ok((message.clone(), None));
        }

        let key = uuid::Uuid::new_v4().to_string();
        self.container
            .open_write(&key, message.content().clone())
            .await?;

        debug!(
            key = %key,
            size_bytes = message.content().len(),
            "Offloaded message content to blob storage"
        );
        Ok((message.clone_with_content(marker_for(&key)), Some(key)))
    }

    /// Delete blobs whose messages never reached the inner publisher
    async fn discard(&self, keys: Vec<&str>) {
        let deletions = keys.into_iter().map(|key| async move {
            if let Err(e) = self.container.delete(key).await {
                warn!(key, error = %e, "Failed to delete blob of unpublished message");
            }
        });
        join_all(deletions).await;
    }
}

#[async_trait]
impl MessagePublisher for LargePayloadPublisher {
    /// Offload oversized content in parallel and forward the batch.
    ///
    /// Failures report the caller's original messages. Blobs written for
    /// messages that were not published are deleted before returning.
    async fn send(&self, messages: Vec<Message>) -> Result<(), MessagingError> {
        let outcomes = join_all(messages.iter().map(|message| self.offload(message))).await;

        let mut transformed = Vec::with_capacity(messages.len());
        let mut keys = Vec::with_capacity(messages.len());
        let mut upload_error = None;
        for outcome in outcomes {
            match outcome {
                Ok((message, key)) => {
                    transformed.push(message);
                    keys.push(key);
                }
                Err(e) => {
                    upload_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = upload_error {
            self.discard(keys.iter().flatten().map(String::as_str).collect())
                .await;
            return Err(MessagingError::PublishFailed {
                message: format!("Failed to offload message content: {}", e),
                failed: messages,
            });
        }

        if let Err(e) = self.inner.send(transformed.clone()).await {
            let (error, positions) = restore_originals(e, &transformed, &messages);
            let unpublished = positions
                .iter()
                .filter_map(|&i| keys.get(i).and_then(|key| key.as_deref()))
                .collect();
            self.discard(unpublished).await;
            return Err(error);
        }

        Ok(())
    }
}

/// Receiver that restores offloaded content and deletes the blob on confirm
#[derive(Clone)]
pub struct LargePayloadReceiver {
    inner: Arc<dyn MessageReceiver>,
    container: Arc<dyn BlobContainer>,
}

impl LargePayloadReceiver {
    pub fn new(inner: Arc<dyn MessageReceiver>, container: Arc<dyn BlobContainer>) -> Self {
        Self { inner, container }
    }
}

async fn restore(
    container: &dyn BlobContainer,
    message: Message,
) -> Result<Message, MessagingError> {
    let Some(key) = parse_marker(message.content()).map(str::to_string) else {
        return Ok(message);
    };

    let content = container.open_read(&key).await?;
    debug!(key = %key, size_bytes = content.len(), "Restored offloaded message content");

    Ok(message
        .clone_with_content(content)
        .with_property(STORAGE_KEY_PREFIX, key))
}

#[async_trait]
impl MessageReceiver for LargePayloadReceiver {
    async fn message_count(&self) -> Result<u64, MessagingError> {
        self.inner.message_count().await
    }

    async fn listen(
        &self,
        handler: MessageHandler,
        cancel: CancellationToken,
    ) -> Result<(), MessagingError> {
        let container = Arc::clone(&self.container);
        let restoring_handler = message_handler(move |messages, cancel| {
            let handler = Arc::clone(&handler);
            let container = Arc::clone(&container);
            async move {
                let restored = try_join_all(
                    messages
                        .into_iter()
                        .map(|message| restore(container.as_ref(), message)),
                )
                .await?;
                handler(restored, cancel).await
            }
        });

        self.inner.listen(restoring_handler, cancel).await
    }

    async fn keep_alive(
        &self,
        messages: &[Message],
        time_to_live: Option<Duration>,
    ) -> Result<(), MessagingError> {
        self.inner.keep_alive(messages, time_to_live).await
    }

    /// Confirm through the wrapped receiver, then delete the blobs of any
    /// restored messages.
    ///
    /// A blob that is already gone is not an error.
    async fn confirm(&self, messages: &[Message]) -> Result<(), MessagingError> {
        self.inner.confirm(messages).await?;

        let deletions = messages
            .iter()
            .filter_map(|message| message.property_str(STORAGE_KEY_PREFIX))
            .map(|key| async move {
                match self.container.delete(key).await {
                    Ok(()) => {
                        debug!(key, "Deleted offloaded blob after confirmation");
                        Ok(())
                    }
                    Err(MessagingError::BlobNotFound { .. }) => Ok(()),
                    Err(e) => Err(e),
                }
            });

        try_join_all(deletions).await?;
        Ok(())
    }

    async fn reject(&self, messages: &[Message]) -> Result<(), MessagingError> {
        self.inner.reject(messages).await
    }

    async fn dead_letter(
        &self,
        messages: &[Message],
        reason: &str,
        error_description: &str,
    ) -> Result<(), MessagingError> {
        self.inner
            .dead_letter(messages, reason, error_description)
            .await
    }
}
