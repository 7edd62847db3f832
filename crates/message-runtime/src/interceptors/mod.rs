//! Interceptors: decorators implementing the capability traits around an
//! inner capability.
//!
//! Interceptors compose by nesting; the outermost one is the capability the
//! caller holds. Order matters: compressing before offloading stores
//! compressed blobs, offloading before compressing compresses the marker.
//! The [`PublisherInterceptorExt`] and [`ReceiverInterceptorExt`] traits
//! build such chains fluently.

pub mod compression;
pub mod dead_letter;
pub mod exception_handling;
pub mod extensions;
pub mod offload;
mod publish_failure;

#[cfg(test)]
mod test_support;

pub use compression::{CompressionLevel, GzipPublisher, GzipReceiver};
pub use dead_letter::DeadLetterRedirectReceiver;
pub use exception_handling::ExceptionHandlingReceiver;
pub use extensions::{PublisherInterceptorExt, ReceiverInterceptorExt};
pub use offload::{
    LargePayloadPublisher, LargePayloadReceiver, MARKER_LENGTH, STORAGE_KEY_PREFIX,
};
