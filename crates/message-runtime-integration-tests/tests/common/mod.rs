//! Common test utilities for message-runtime integration tests
//!
//! This module provides:
//! - Tracing setup for test output
//! - Helpers for running listeners in the background
//! - Channel-based collection of delivered batches

use message_runtime::{message_handler, InMemoryBroker, Message, MessageHandler, MessageReceiver};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const WAIT: Duration = Duration::from_secs(60);

/// Install a tracing subscriber honouring `RUST_LOG`; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A background listener forwarding every delivered batch into a channel
pub struct ChannelListener {
    pub batches: mpsc::UnboundedReceiver<Vec<Message>>,
    pub task: JoinHandle<Result<(), message_runtime::MessagingError>>,
}

impl ChannelListener {
    /// Receive the next delivered batch
    pub async fn next_batch(&mut self) -> Vec<Message> {
        tokio::time::timeout(WAIT, self.batches.recv())
            .await
            .expect("batch should arrive in time")
            .expect("listener should still be running")
    }

    /// Receive batches until at least `count` messages have arrived
    #[allow(dead_code)]
    pub async fn collect(&mut self, count: usize) -> Vec<Message> {
        let mut received = Vec::new();
        while received.len() < count {
            received.extend(self.next_batch().await);
        }
        received
    }
}

/// Start listening on `receiver`, forwarding batches into a channel
pub fn spawn_channel_listener(
    receiver: Arc<dyn MessageReceiver>,
    cancel: &CancellationToken,
) -> ChannelListener {
    let (tx, batches) = mpsc::unbounded_channel();
    let handler = message_handler(move |messages, _| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(messages);
            Ok(())
        }
    });

    ChannelListener {
        batches,
        task: spawn_listener(receiver, handler, cancel),
    }
}

/// Start listening on `receiver` with an arbitrary handler
pub fn spawn_listener(
    receiver: Arc<dyn MessageReceiver>,
    handler: MessageHandler,
    cancel: &CancellationToken,
) -> JoinHandle<Result<(), message_runtime::MessagingError>> {
    let cancel = cancel.clone();
    tokio::spawn(async move { receiver.listen(handler, cancel).await })
}

/// Wait until the broker has the expected number of registered listeners
pub async fn wait_for_listeners(broker: &InMemoryBroker, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while broker.listener_count() != expected {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("listeners should register in time");
}

/// Content of each message as UTF-8 text
#[allow(dead_code)]
pub fn texts(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .map(|m| String::from_utf8_lossy(m.content()).into_owned())
        .collect()
}
