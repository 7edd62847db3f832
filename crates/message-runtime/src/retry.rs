//! # Listen Retry Module
//!
//! Keeps a receiver listening across transient failures.
//!
//! [`listen_with_retry`] calls [`MessageReceiver::listen`] in a loop. A
//! failed attempt is logged and followed by a fixed backoff; only
//! cancellation ends the loop.

use crate::client::{MessageHandler, MessageReceiver};
use crate::config::ListenRetryConfig;
use crate::error::MessagingError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;

/// Retry policy for [`listen_with_retry`]
///
/// # Examples
///
/// ```rust
/// use message_runtime::retry::ListenRetryPolicy;
/// use std::time::Duration;
///
/// // Default policy: 5s between attempts
/// let policy = ListenRetryPolicy::default();
/// assert_eq!(policy.backoff, Duration::from_secs(5));
///
/// let policy = ListenRetryPolicy::new(Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenRetryPolicy {
    /// Delay between a failed listen attempt and the next one
    pub backoff: Duration,
}

impl ListenRetryPolicy {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }
}

impl Default for ListenRetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(5),
        }
    }
}

impl From<&ListenRetryConfig> for ListenRetryPolicy {
    fn from(config: &ListenRetryConfig) -> Self {
        Self::new(config.backoff())
    }
}

/// Listen on `receiver` until `cancel` fires, restarting after failures.
///
/// Any error other than a cancellation is logged and retried after the
/// policy's backoff. A `listen` call that returns successfully although
/// `cancel` has not fired is treated the same way. Firing `cancel` ends the
/// loop with `Ok(())`. A [`MessagingError::Cancelled`] reported by the
/// receiver while `cancel` is still live, such as a broker shutting down,
/// is returned to the caller without retrying.
pub async fn listen_with_retry<R>(
    receiver: &R,
    handler: MessageHandler,
    policy: &ListenRetryPolicy,
    cancel: CancellationToken,
) -> Result<(), MessagingError>
where
    R: MessageReceiver + ?Sized,
{
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;

        match receiver.listen(handler.clone(), cancel.clone()).await {
            Ok(()) if cancel.is_cancelled() => return Ok(()),
            Ok(()) => {
                warn!(
                    attempt,
                    backoff_ms = policy.backoff.as_millis() as u64,
                    "Listen returned before cancellation, restarting"
                );
            }
            Err(_) if cancel.is_cancelled() => return Ok(()),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                error!(
                    attempt,
                    error = %e,
                    backoff_ms = policy.backoff.as_millis() as u64,
                    "Error while listening for messages, retrying after backoff"
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(policy.backoff) => {}
        }
    }
}
