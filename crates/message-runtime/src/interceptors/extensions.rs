//! Fluent composition of interceptors.

use super::{
    CompressionLevel, DeadLetterRedirectReceiver, ExceptionHandlingReceiver, GzipPublisher,
    GzipReceiver, LargePayloadPublisher, LargePayloadReceiver,
};
use crate::blob_storage::BlobContainer;
use crate::client::{MessagePublisher, MessageReceiver};
use std::sync::Arc;

#[cfg(test)]
#[path = "extensions_tests.rs"]
mod tests;

/// Wrap a shared publisher in interceptors
///
/// # Examples
///
/// ```
/// use message_runtime::adapters::InMemoryBlobContainer;
/// use message_runtime::client::MessagePublisher;
/// use message_runtime::interceptors::{CompressionLevel, PublisherInterceptorExt};
/// use message_runtime::InMemoryBroker;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let broker: Arc<dyn MessagePublisher> = Arc::new(InMemoryBroker::default());
/// let publisher = broker
///     .with_large_payload_offload(Arc::new(InMemoryBlobContainer::new()), 64 * 1024)
///     .with_gzip_compression(CompressionLevel::default());
/// # let _ = publisher;
/// # }
/// ```
pub trait PublisherInterceptorExt {
    /// Gzip-compress content before sending
    fn with_gzip_compression(self, level: CompressionLevel) -> Arc<dyn MessagePublisher>;

    /// Offload content larger than `threshold_bytes` to `container`
    fn with_large_payload_offload(
        self,
        container: Arc<dyn BlobContainer>,
        threshold_bytes: usize,
    ) -> Arc<dyn MessagePublisher>;
}

impl PublisherInterceptorExt for Arc<dyn MessagePublisher> {
    fn with_gzip_compression(self, level: CompressionLevel) -> Arc<dyn MessagePublisher> {
        Arc::new(GzipPublisher::new(self, level))
    }

    fn with_large_payload_offload(
        self,
        container: Arc<dyn BlobContainer>,
        threshold_bytes: usize,
    ) -> Arc<dyn MessagePublisher> {
        Arc::new(LargePayloadPublisher::new(self, container, threshold_bytes))
    }
}

/// Wrap a shared receiver in interceptors
pub trait ReceiverInterceptorExt {
    /// Decompress gzip-framed content before delivery
    fn with_gzip_decompression(self) -> Arc<dyn MessageReceiver>;

    /// Restore offloaded content from `container`
    fn with_large_payload_offload(self, container: Arc<dyn BlobContainer>)
        -> Arc<dyn MessageReceiver>;

    /// Redirect dead-lettered messages to `publisher`
    fn with_dead_lettering(self, publisher: Arc<dyn MessagePublisher>) -> Arc<dyn MessageReceiver>;

    /// Reject batches whose handler fails instead of surfacing the failure
    fn with_exception_handling(self) -> Arc<dyn MessageReceiver>;
}

impl ReceiverInterceptorExt for Arc<dyn MessageReceiver> {
    fn with_gzip_decompression(self) -> Arc<dyn MessageReceiver> {
        Arc::new(GzipReceiver::new(self))
    }

    fn with_large_payload_offload(
        self,
        container: Arc<dyn BlobContainer>,
    ) -> Arc<dyn MessageReceiver> {
        Arc::new(LargePayloadReceiver::new(self, container))
    }

    fn with_dead_lettering(self, publisher: Arc<dyn MessagePublisher>) -> Arc<dyn MessageReceiver> {
        Arc::new(DeadLetterRedirectReceiver::new(self, publisher))
    }

    fn with_exception_handling(self) -> Arc<dyn MessageReceiver> {
        Arc::new(ExceptionHandlingReceiver::new(self))
    }
}
