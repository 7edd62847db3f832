//! Capability traits implemented by every transport and every interceptor.
//!
//! A transport exposes a [`MessagePublisher`], a [`MessageReceiver`], or both.
//! Interceptors implement the same traits and hold the capability they wrap,
//! so any number of them can be nested in front of a transport.

use crate::error::MessagingError;
use crate::message::Message;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Future returned by a [`MessageHandler`]
pub type HandlerFuture = BoxFuture<'static, Result<(), MessagingError>>;

/// Callback invoked by [`MessageReceiver::listen`] with each delivered batch.
///
/// The cancellation token passed to the handler is the one supplied to `listen`.
pub type MessageHandler =
    Arc<dyn Fn(Vec<Message>, CancellationToken) -> HandlerFuture + Send + Sync>;

/// Build a [`MessageHandler`] from an async closure.
///
/// # Example
///
/// ```rust
/// use message_runtime::client::message_handler;
///
/// let handler = message_handler(|messages, _cancel| async move {
///     for message in messages {
///         println!("received {} bytes", message.content().len());
///     }
///     Ok(())
/// });
/// # let _ = handler;
/// ```
pub fn message_handler<F, Fut>(handler: F) -> MessageHandler
where
    F: Fn(Vec<Message>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), MessagingError>> + Send + 'static,
{
    Arc::new(move |messages, cancel| Box::pin(handler(messages, cancel)))
}

/// Publishes batches of messages to a queue, broker or ingestion system
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Send a batch of messages.
    ///
    /// A failure may cover only part of the batch; the failed subset is
    /// reported through [`MessagingError::PublishFailed`].
    async fn send(&self, messages: Vec<Message>) -> Result<(), MessagingError>;
}

/// Receives messages from a queue, broker or ingestion system
#[async_trait]
pub trait MessageReceiver: Send + Sync {
    /// Count of messages waiting to be processed.
    ///
    /// Push-based transports fail with [`MessagingError::NotSupported`].
    async fn message_count(&self) -> Result<u64, MessagingError>;

    /// Deliver batches to `handler` until `cancel` fires.
    ///
    /// Resolves with `Ok(())` after cancellation and with an error when the
    /// underlying transport fails.
    async fn listen(
        &self,
        handler: MessageHandler,
        cancel: CancellationToken,
    ) -> Result<(), MessagingError>;

    /// Extend the delivery lease of the given messages
    async fn keep_alive(
        &self,
        messages: &[Message],
        time_to_live: Option<Duration>,
    ) -> Result<(), MessagingError>;

    /// Confirm processing and remove the messages from the queue
    async fn confirm(&self, messages: &[Message]) -> Result<(), MessagingError>;

    /// Reject the messages so they are redelivered later
    async fn reject(&self, messages: &[Message]) -> Result<(), MessagingError>;

    /// Move the messages out of the normal lifecycle
    async fn dead_letter(
        &self,
        messages: &[Message],
        reason: &str,
        error_description: &str,
    ) -> Result<(), MessagingError>;
}

/// Single-message conveniences for any [`MessagePublisher`]
#[async_trait]
pub trait MessagePublisherExt: MessagePublisher {
    /// Send a single message
    async fn send_one(&self, message: Message) -> Result<(), MessagingError> {
        self.send(vec![message]).await
    }
}

impl<P: MessagePublisher + ?Sized> MessagePublisherExt for P {}

/// Single-message conveniences for any [`MessageReceiver`]
#[async_trait]
pub trait MessageReceiverExt: MessageReceiver {
    /// Confirm a single message
    async fn confirm_one(&self, message: &Message) -> Result<(), MessagingError> {
        self.confirm(std::slice::from_ref(message)).await
    }

    /// Reject a single message
    async fn reject_one(&self, message: &Message) -> Result<(), MessagingError> {
        self.reject(std::slice::from_ref(message)).await
    }

    /// Dead-letter a single message
    async fn dead_letter_one(
        &self,
        message: &Message,
        reason: &str,
        error_description: &str,
    ) -> Result<(), MessagingError> {
        self.dead_letter(std::slice::from_ref(message), reason, error_description)
            .await
    }

    /// Extend the lease of a single message
    async fn keep_alive_one(
        &self,
        message: &Message,
        time_to_live: Option<Duration>,
    ) -> Result<(), MessagingError> {
        self.keep_alive(std::slice::from_ref(message), time_to_live)
            .await
    }
}

impl<R: MessageReceiver + ?Sized> MessageReceiverExt for R {}
