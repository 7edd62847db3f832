//! # Message Runtime
//!
//! Transport-agnostic publish/receive runtime with composable interceptors.
//!
//! This library provides:
//! - A uniform [`MessagePublisher`] / [`MessageReceiver`] contract
//! - An in-memory broker with broadcast delivery for tests and local development
//! - Interceptors for gzip compression, large-payload offload, dead-letter
//!   redirection and handler failure containment
//! - A listen loop that survives transient failures
//! - Partition-ordered parallel processing of received batches
//!
//! ## Module Organization
//!
//! - [`message`] - The message value carried through every layer
//! - [`client`] - Capability traits and handler types
//! - [`error`] - Error types for all messaging operations
//! - [`providers`] - In-memory and null transports
//! - [`interceptors`] - Decorators around publishers and receivers
//! - [`blob_storage`] / [`adapters`] - Blob containers used for payload offload
//! - [`retry`] - Listen-with-retry helper
//! - [`partition`] - Partition-ordered parallel processor
//! - [`config`] - Layered runtime configuration

pub mod adapters;
pub mod blob_storage;
pub mod client;
pub mod config;
pub mod error;
pub mod interceptors;
pub mod message;
pub mod partition;
pub mod providers;
pub mod retry;

// Re-export commonly used types at crate root for convenience
pub use blob_storage::BlobContainer;
pub use client::{
    message_handler, HandlerFuture, MessageHandler, MessagePublisher, MessagePublisherExt,
    MessageReceiver, MessageReceiverExt,
};
pub use config::MessagingConfig;
pub use error::{ConfigurationError, MessagingError, ValidationError};
pub use interceptors::{PublisherInterceptorExt, ReceiverInterceptorExt};
pub use message::{Message, Properties, PropertyValue};
pub use partition::{process_by_partition_key, process_by_partition_key_with};
pub use providers::{InMemoryBroker, NullPublisher, NullReceiver};
pub use retry::{listen_with_retry, ListenRetryPolicy};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
