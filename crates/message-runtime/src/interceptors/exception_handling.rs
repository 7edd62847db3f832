//! Handler failure containment.

use crate::client::{message_handler, MessageHandler, MessageReceiver};
use crate::error::MessagingError;
use crate::message::Message;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

#[cfg(test)]
#[path = "exception_handling_tests.rs"]
mod tests;

/// Receiver that turns handler failures into rejections.
///
/// When the handler returns an error or panics for a batch, the failure is
/// logged, every message of the batch is rejected through the wrapped
/// receiver and the handler invocation reports success.
#[derive(Clone)]
pub struct ExceptionHandlingReceiver {
    inner: Arc<dyn MessageReceiver>,
}

impl ExceptionHandlingReceiver {
    pub fn new(inner: Arc<dyn MessageReceiver>) -> Self {
        Self { inner }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[async_trait]
impl MessageReceiver for ExceptionHandlingReceiver {
    async fn message_count(&self) -> Result<u64, MessagingError> {
        self.inner.message_count().await
    }

    async fn listen(
        &self,
        handler: MessageHandler,
        cancel: CancellationToken,
    ) -> Result<(), MessagingError> {
        let inner = Arc::clone(&self.inner);
        let guarded_handler = message_handler(move |messages, cancel| {
            let handler = Arc::clone(&handler);
            let inner = Arc::clone(&inner);
            async move {
                let batch = messages.clone();
                let outcome = AssertUnwindSafe(handler(messages, cancel))
                    .catch_unwind()
                    .await;

                let failure = match outcome {
                    Ok(Ok(())) => return Ok(()),
                    Ok(Err(e)) if e.is_cancellation() => {
                        debug!(batch_size = batch.len(), "Handler cancelled, rejecting batch");
                        return reject_batch(inner.as_ref(), &batch).await;
                    }
                    Ok(Err(e)) => e.to_string(),
                    Err(payload) => panic_message(payload.as_ref()),
                };

                error!(
                    batch_size = batch.len(),
                    error = %failure,
                    "An error occurred while processing messages, rejecting batch"
                );
                reject_batch(inner.as_ref(), &batch).await
            }
        });

        self.inner.listen(guarded_handler, cancel).await
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

/// Reject a failed batch; a failing reject is logged, never propagated
async fn reject_batch(
    receiver: &dyn MessageReceiver,
    batch: &[Message],
) -> Result<(), MessagingError> {
    if let Err(e) = receiver.reject(batch).await {
        error!(
            batch_size = batch.len(),
            error = %e,
            "Failed to reject batch after handler failure"
        );
    }
    Ok(())
}
