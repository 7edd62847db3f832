//! Gzip compression interceptors.
//!
//! Compressed content is framed as a 4-byte little-endian original length
//! followed by the gzip stream. Compression and decompression run on the
//! blocking thread pool.

use crate::client::{message_handler, MessageHandler, MessagePublisher, MessageReceiver};
use crate::config::CompressionConfig;
use crate::error::{MessagingError, ValidationError};
use crate::interceptors::publish_failure::restore_originals;
use crate::message::Message;
use async_trait::async_trait;
use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[cfg(test)]
#[path = "compression_tests.rs"]
mod tests;

const LENGTH_PREFIX_SIZE: usize = 4;

/// Gzip compression level between 0 (store only) and 9 (smallest output)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    pub const FASTEST: Self = Self(1);
    pub const BEST: Self = Self(9);

    /// Create a validated compression level
    pub fn new(level: u32) -> Result<Self, ValidationError> {
        if level > 9 {
            return Err(ValidationError::OutOfRange {
                field: "compression_level".to_string(),
                message: format!("must be between 0 and 9, got {}", level),
            });
        }
        Ok(Self(level))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(6)
    }
}

impl TryFrom<&CompressionConfig> for CompressionLevel {
    type Error = ValidationError;

    fn try_from(config: &CompressionConfig) -> Result<Self, Self::Error> {
        Self::new(config.level)
    }
}

/// Compress content into the length-prefixed gzip frame
pub fn compress(content: &[u8], level: CompressionLevel) -> std::io::Result<Bytes> {
    let length = u32::try_from(content.len()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "content exceeds the 4 GiB length prefix",
        )
    })?;

    let mut framed = Vec::with_capacity(LENGTH_PREFIX_SIZE + content.len() / 2);
    framed.extend_from_slice(&length.to_le_bytes());

    let mut encoder = GzEncoder::new(framed, Compression::new(level.value()));
    encoder.write_all(content)?;
    Ok(Bytes::from(encoder.finish()?))
}

/// Decompress a length-prefixed gzip frame.
///
/// Returns `None` when the input is not a valid frame, including when the
/// decompressed size disagrees with the prefix.
pub fn decompress(framed: &[u8]) -> Option<Bytes> {
    if framed.len() < LENGTH_PREFIX_SIZE {
        return None;
    }

    let (prefix, body) = framed.split_at(LENGTH_PREFIX_SIZE);
    let expected = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as u64;

    // Read at most one byte past the announced length
    let mut decoded = Vec::new();
    GzDecoder::new(body)
        .take(expected + 1)
        .read_to_end(&mut decoded)
        .ok()?;

    (decoded.len() as u64 == expected).then(|| Bytes::from(decoded))
}

fn compress_batch(
    messages: Vec<Message>,
    level: CompressionLevel,
) -> Result<Vec<Message>, MessagingError> {
    let compressed: std::io::Result<Vec<Message>> = messages
        .iter()
        .map(|message| {
            compress(message.content(), level).map(|content| message.clone_with_content(content))
        })
        .collect();

    compressed.map_err(|e| MessagingError::PublishFailed {
        message: format!("Failed to compress message content: {}", e),
        failed: messages,
    })
}

fn decompress_batch(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .map(|message| match decompress(message.content()) {
            Some(content) => message.clone_with_content(content),
            None => {
                debug!(
                    message_id = message.id().unwrap_or_default(),
                    "Content is not gzip framed, passing through unchanged"
                );
                message
            }
        })
        .collect()
}

/// Publisher that gzip-compresses message content before forwarding
#[derive(Clone)]
pub struct GzipPublisher {
    inner: Arc<dyn MessagePublisher>,
    level: CompressionLevel,
}

impl GzipPublisher {
    pub fn new(inner: Arc<dyn MessagePublisher>, level: CompressionLevel) -> Self {
        Self { inner, level }
    }
}

#[async_trait]
impl MessagePublisher for GzipPublisher {
    /// Compress and forward the batch.
    ///
    /// A failed subset reported by the inner publisher is returned as the
    /// uncompressed messages the caller sent.
    async fn send(&self, messages: Vec<Message>) -> Result<(), MessagingError> {
        let level = self.level;
        let originals = messages.clone();
        let compressed = tokio::task::spawn_blocking(move || compress_batch(messages, level))
            .await
            .map_err(|e| MessagingError::Internal {
                message: format!("Compression task failed: {}", e),
            })??;

        self.inner
            .send(compressed.clone())
            .await
            .map_err(|e| restore_originals(e, &compressed, &originals).0)
    }
}

/// Receiver that decompresses gzip-framed content before the handler sees it.
///
/// Content that fails to decode is delivered as received.
#[derive(Clone)]
pub struct GzipReceiver {
    inner: Arc<dyn MessageReceiver>,
}

impl GzipReceiver {
    pub fn new(inner: Arc<dyn MessageReceiver>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MessageReceiver for GzipReceiver {
    async fn message_count(&self) -> Result<u64, MessagingError> {
        self.inner.message_count().await
    }

    async fn listen(
        &self,
        handler: MessageHandler,
        cancel: CancellationToken,
    ) -> Result<(), MessagingError> {
        let decoding_handler = message_handler(move |messages, cancel| {
            let handler = Arc::clone(&handler);
            async move {
                let decoded = tokio::task::spawn_blocking(move || decompress_batch(messages))
                    .await
                    .map_err(|e| MessagingError::Internal {
                        message: format!("Decompression task failed: {}", e),
                    })?;
                handler(decoded, cancel).await
            }
        });

        self.inner.listen(decoding_handler, cancel).await
    }

    async fn keep_alive(
        &self,
        messages: &[Message],
        time_to_live: Option<Duration>,
    ) -> Result<(), MessagingError> {
        self.inner.keep_alive(messages, time_to_live).await
    }

    async fn confirm(&self, messages: &[Message]) -> Result<(), MessagingError> {
        self.inner.confirm(messages).await
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
