//! Transports that accept everything and deliver nothing.
//!
//! Useful as a placeholder where a publisher or receiver is required but no
//! messaging should happen, such as disabled features or unit tests.

use crate::client::{MessageHandler, MessagePublisher, MessageReceiver};
use crate::error::MessagingError;
use crate::message::Message;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[cfg(test)]
#[path = "null_tests.rs"]
mod tests;

/// Publisher that discards every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

#[async_trait]
impl MessagePublisher for NullPublisher {
    async fn send(&self, messages: Vec<Message>) -> Result<(), MessagingError> {
        trace!(count = messages.len(), "Discarding messages");
        Ok(())
    }
}

/// Receiver that never delivers a message.
///
/// `listen` stays pending until its cancellation token fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReceiver;

#[async_trait]
impl MessageReceiver for NullReceiver {
    async fn message_count(&self) -> Result<u64, MessagingError> {
        Ok(0)
    }

    async fn listen(
        &self,
        _handler: MessageHandler,
        cancel: CancellationToken,
    ) -> Result<(), MessagingError> {
        cancel.cancelled().await;
        Ok(())
    }

    async fn keep_alive(
        &self,
        _messages: &[Message],
        _time_to_live: Option<Duration>,
    ) -> Result<(), MessagingError> {
        Ok(())
    }

    async fn confirm(&self, _messages: &[Message]) -> Result<(), MessagingError> {
        Ok(())
    }

    async fn reject(&self, _messages: &[Message]) -> Result<(), MessagingError> {
        Ok(())
    }

    async fn dead_letter(
        &self,
        _messages: &[Message],
        _reason: &str,
        _error_description: &str,
    ) -> Result<(), MessagingError> {
        Ok(())
    }
}
