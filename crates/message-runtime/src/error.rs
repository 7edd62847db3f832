//! Error types for messaging operations.

use crate::message::Message;
use thiserror::Error;

/// Comprehensive error type for all publish and receive operations
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Publishing failed for {} message(s): {message}", failed.len())]
    PublishFailed {
        failed: Vec<Message>,
        message: String,
    },

    #[error("Operation not supported by this transport: {operation}")]
    NotSupported { operation: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Message handler failed: {message}")]
    HandlerFailed { message: String },

    #[error("Blob not found: {key}")]
    BlobNotFound { key: String },

    #[error("Blob storage error: {message}")]
    BlobStorage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Application error: {0}")]
    Application(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl MessagingError {
    /// Check if error is transient and the operation may succeed when repeated
    pub fn is_transient(&self) -> bool {
        match self {
            Self::PublishFailed { .. } => true,
            Self::NotSupported { .. } => false,
            Self::ConnectionFailed { .. } => true,
            Self::Cancelled => false,
            Self::HandlerFailed { .. } => true,
            Self::BlobNotFound { .. } => false,
            Self::BlobStorage { .. } => true,
            Self::Internal { .. } => false,
            Self::Application(_) => false,
            Self::Configuration(_) => false,
            Self::Validation(_) => false,
        }
    }

    /// Check if error represents cooperative cancellation rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if error is the distinct "operation not supported" signal
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported { .. })
    }

    /// Messages that could not be published, if this is a publish failure
    pub fn failed_messages(&self) -> &[Message] {
        match self {
            Self::PublishFailed { failed, .. } => failed,
            _ => &[],
        }
    }

    /// Create a not-supported error for the named operation
    pub fn not_supported(operation: &str) -> Self {
        Self::NotSupported {
            operation: operation.to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
