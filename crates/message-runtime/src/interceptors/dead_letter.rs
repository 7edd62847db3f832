//! Application-level dead-letter queue.

use crate::client::{MessageHandler, MessagePublisher, MessageReceiver};
use crate::error::MessagingError;
use crate::message::Message;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[cfg(test)]
#[path = "dead_letter_tests.rs"]
mod tests;

/// Receiver that redirects dead-lettered messages to another publisher.
///
/// `dead_letter` publishes the messages to the dead-letter publisher and then
/// confirms them against the wrapped receiver so they leave the source
/// queue. The wrapped receiver's own dead-letter store is never used. If
/// publishing fails the messages are not confirmed.
#[derive(Clone)]
pub struct DeadLetterRedirectReceiver {
    inner: Arc<dyn MessageReceiver>,
    dead_letter_publisher: Arc<dyn MessagePublisher>,
}

impl DeadLetterRedirectReceiver {
    pub fn new(
        inner: Arc<dyn MessageReceiver>,
        dead_letter_publisher: Arc<dyn MessagePublisher>,
    ) -> Self {
        Self {
            inner,
            dead_letter_publisher,
        }
    }
}

#[async_trait]
impl MessageReceiver for DeadLetterRedirectReceiver {
    async fn message_count(&self) -> Result<u64, MessagingError> {
        self.inner.message_count().await
    }

    async fn listen(
        &self,
        handler: MessageHandler,
        cancel: CancellationToken,
    ) -> Result<(), MessagingError> {
        self.inner.listen(handler, cancel).await
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
        self.dead_letter_publisher.send(messages.to_vec()).await?;
        self.inner.confirm(messages).await?;

        info!(
            count = messages.len(),
            reason, error_description, "Redirected messages to dead-letter publisher"
        );
        Ok(())
    }
}
