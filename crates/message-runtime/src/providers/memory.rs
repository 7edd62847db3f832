//! In-memory broker implementation for testing and development.
//!
//! This module provides a volatile, process-local publisher and receiver that:
//! - Keeps a single FIFO queue of pending messages
//! - Dispatches batches from one background task owned by the broker
//! - Broadcasts every batch to every registered listener
//! - Keeps dead-lettered messages in an append-only store
//!
//! # Broadcast delivery
//!
//! Unlike the competing-consumer semantics of real queue transports, every
//! listener registered on an [`InMemoryBroker`] receives every dispatched
//! batch. Registering two listeners therefore processes each message twice.
//! The dispatch task waits for all listeners to finish a batch before it
//! hands out the next one, so a slow listener delays delivery for everyone
//! on the same broker.
//!
//! # Acknowledgement
//!
//! Messages leave the queue when they are dispatched. `confirm` and
//! `keep_alive` succeed without effect; `reject` puts the messages back at
//! the tail of the queue after the configured delay.

use crate::client::{MessageHandler, MessagePublisher, MessageReceiver};
use crate::config::BrokerConfig;
use crate::error::MessagingError;
use crate::message::Message;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// A queued message, optionally tracked by a waiting `send_and_wait` call
struct QueuedMessage {
    message: Message,
    tracker: Option<Arc<DeliveryTracker>>,
}

impl QueuedMessage {
    fn untracked(message: Message) -> Self {
        Self {
            message,
            tracker: None,
        }
    }

    /// Release any waiter tracking this message
    fn finish(self) {
        if let Some(tracker) = self.tracker {
            tracker.complete_one();
        }
    }
}

/// Counts down the messages of one `send_and_wait` batch
struct DeliveryTracker {
    remaining: AtomicUsize,
    done: Notify,
}

impl DeliveryTracker {
    fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            done: Notify::new(),
        }
    }

    fn complete_one(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.done.notify_waiters();
        }
    }

    async fn wait(&self) {
        loop {
            let notified = self.done.notified();
            if self.remaining.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// A registered listener
#[derive(Clone)]
struct Listener {
    handler: MessageHandler,
    cancel: CancellationToken,
}

/// Queue and listener set, mutated only under one lock
#[derive(Default)]
struct BrokerInner {
    queue: VecDeque<QueuedMessage>,
    listeners: HashMap<u64, Listener>,
    next_listener_id: u64,
}

/// A dead-lettered message together with the reason it was given
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetterRecord {
    pub message: Message,
    pub reason: String,
    pub error_description: String,
}

/// State shared between the broker handle and its dispatch task
struct BrokerState {
    inner: Mutex<BrokerInner>,
    dead_letters: Mutex<Vec<DeadLetterRecord>>,
    work_available: Notify,
    /// `true` while a dispatched batch is being handled
    in_flight: watch::Sender<bool>,
    config: BrokerConfig,
}

impl BrokerState {
    fn new(config: BrokerConfig) -> Self {
        let (in_flight, _) = watch::channel(false);
        Self {
            inner: Mutex::new(BrokerInner::default()),
            dead_letters: Mutex::new(Vec::new()),
            work_available: Notify::new(),
            in_flight,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BrokerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, messages: impl IntoIterator<Item = QueuedMessage>) {
        {
            let mut inner = self.lock();
            inner.queue.extend(messages);
        }
        self.work_available.notify_one();
    }

    fn register(&self, listener: Listener) -> u64 {
        let id = {
            let mut inner = self.lock();
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            inner.listeners.insert(id, listener);
            id
        };
        self.work_available.notify_one();
        id
    }

    fn deregister(&self, id: u64) {
        self.lock().listeners.remove(&id);
    }

    /// Take the next batch and snapshot the active listeners.
    ///
    /// Returns `None` when the queue is empty or nobody is listening. Marks
    /// the broker as busy under the same lock that drains the queue.
    fn take_batch(&self) -> Option<(Vec<QueuedMessage>, Vec<(u64, Listener)>)> {
        let mut inner = self.lock();

        let listeners: Vec<(u64, Listener)> = inner
            .listeners
            .iter()
            .filter(|(_, listener)| !listener.cancel.is_cancelled())
            .map(|(id, listener)| (*id, listener.clone()))
            .collect();

        if listeners.is_empty() || inner.queue.is_empty() {
            return None;
        }

        let count = inner.queue.len().min(self.config.max_batch_size.max(1));
        let batch: Vec<QueuedMessage> = inner.queue.drain(..count).collect();
        self.in_flight.send_replace(true);

        Some((batch, listeners))
    }

    /// Hand one batch to every listener concurrently and wait for all of them
    async fn deliver(&self, batch: Vec<QueuedMessage>, listeners: Vec<(u64, Listener)>) {
        let messages: Vec<Message> = batch.iter().map(|q| q.message.clone()).collect();
        debug!(
            batch_size = messages.len(),
            listener_count = listeners.len(),
            "Dispatching batch to listeners"
        );

        let invocations = listeners.into_iter().map(|(listener_id, listener)| {
            let messages = messages.clone();
            let handle = tokio::spawn(async move {
                (listener.handler)(messages, listener.cancel).await
            });
            async move { (listener_id, handle.await) }
        });

        for (listener_id, outcome) in join_all(invocations).await {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancellation() => {
                    debug!(listener_id, "Listener cancelled while handling batch");
                }
                Ok(Err(e)) => {
                    error!(listener_id, error = %e, "Listener failed to handle batch");
                }
                Err(e) => {
                    error!(listener_id, error = %e, "Listener panicked while handling batch");
                }
            }
        }

        for queued in batch {
            queued.finish();
        }
        self.in_flight.send_replace(false);
    }
}

/// Removes a listener when its `listen` call ends, including when the
/// `listen` future is dropped
struct ListenerRegistration {
    state: Arc<BrokerState>,
    id: u64,
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.state.deregister(self.id);
    }
}

async fn run_dispatch_loop(state: Arc<BrokerState>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = state.work_available.notified() => {}
        }

        while let Some((batch, listeners)) = state.take_batch() {
            state.deliver(batch, listeners).await;
            if shutdown.is_cancelled() {
                break;
            }
        }
    }

    debug!("In-memory broker dispatch loop stopped");
}

// ============================================================================
// InMemoryBroker
// ============================================================================

/// Volatile, process-local publisher and receiver.
///
/// The broker owns its dispatch task: it starts on construction and stops on
/// [`InMemoryBroker::shutdown`] or when the broker is dropped. Construction
/// must happen inside a Tokio runtime.
///
/// # Example
///
/// ```rust
/// use message_runtime::client::{message_handler, MessagePublisher, MessageReceiver};
/// use message_runtime::{InMemoryBroker, Message};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), message_runtime::MessagingError> {
/// let broker = Arc::new(InMemoryBroker::default());
/// let cancel = CancellationToken::new();
///
/// let listener = {
///     let broker = Arc::clone(&broker);
///     let cancel = cancel.clone();
///     tokio::spawn(async move {
///         let handler = message_handler(|messages, _| async move {
///             println!("got {} message(s)", messages.len());
///             Ok(())
///         });
///         broker.listen(handler, cancel).await
///     })
/// };
///
/// broker.send_and_wait(vec![Message::new("hello")]).await?;
/// cancel.cancel();
/// let _ = listener.await;
/// # Ok(())
/// # }
/// ```
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
    shutdown_token: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl InMemoryBroker {
    /// Create new broker and start its dispatch task
    pub fn new(config: BrokerConfig) -> Self {
        let state = Arc::new(BrokerState::new(config));
        let shutdown_token = CancellationToken::new();
        let dispatcher = tokio::spawn(run_dispatch_loop(
            Arc::clone(&state),
            shutdown_token.clone(),
        ));

        Self {
            state,
            shutdown_token,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Enqueue messages and wait until every listener registered at dispatch
    /// time has finished handling them.
    ///
    /// Messages removed by [`InMemoryBroker::purge`] count as finished.
    /// Returns [`MessagingError::Cancelled`] if the broker shuts down first.
    pub async fn send_and_wait(&self, messages: Vec<Message>) -> Result<(), MessagingError> {
        if messages.is_empty() {
            return Ok(());
        }

        let tracker = Arc::new(DeliveryTracker::new(messages.len()));
        self.state.enqueue(messages.into_iter().map(|message| QueuedMessage {
            message,
            tracker: Some(Arc::clone(&tracker)),
        }));

        tokio::select! {
            _ = tracker.wait() => Ok(()),
            _ = self.shutdown_token.cancelled() => Err(MessagingError::Cancelled),
        }
    }

    /// Discard all pending messages and wait until no batch is in flight.
    ///
    /// When this returns, no handler is still working on a batch taken before
    /// the purge.
    pub async fn purge(&self) {
        let discarded = std::mem::take(&mut self.state.lock().queue);
        let count = discarded.len();
        for queued in discarded {
            queued.finish();
        }

        let mut in_flight = self.state.in_flight.subscribe();
        let _ = in_flight.wait_for(|busy| !*busy).await;

        info!(discarded = count, "Purged in-memory broker queue");
    }

    /// Stop the dispatch task and wait for it to finish its current batch
    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();

        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = dispatcher {
            if let Err(e) = handle.await {
                error!(error = %e, "In-memory broker dispatch loop terminated abnormally");
            }
            info!("In-memory broker shut down");
        }
    }

    /// Messages moved to the dead-letter store, oldest first
    pub fn dead_letter_messages(&self) -> Vec<Message> {
        self.dead_letter_records()
            .into_iter()
            .map(|record| record.message)
            .collect()
    }

    /// Dead-letter store including reasons, oldest first
    pub fn dead_letter_records(&self) -> Vec<DeadLetterRecord> {
        self.state
            .dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of currently registered listeners
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Broker configuration
    pub fn config(&self) -> &BrokerConfig {
        &self.state.config
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl Drop for InMemoryBroker {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    async fn send(&self, messages: Vec<Message>) -> Result<(), MessagingError> {
        self.state
            .enqueue(messages.into_iter().map(QueuedMessage::untracked));
        Ok(())
    }
}

#[async_trait]
impl MessageReceiver for InMemoryBroker {
    async fn message_count(&self) -> Result<u64, MessagingError> {
        Ok(self.state.lock().queue.len() as u64)
    }

    async fn listen(
        &self,
        handler: MessageHandler,
        cancel: CancellationToken,
    ) -> Result<(), MessagingError> {
        let id = self.state.register(Listener {
            handler,
            cancel: cancel.clone(),
        });
        let _registration = ListenerRegistration {
            state: Arc::clone(&self.state),
            id,
        };
        debug!(listener_id = id, "Listener registered");

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(listener_id = id, "Listener cancelled");
                Ok(())
            }
            _ = self.shutdown_token.cancelled() => Err(MessagingError::Cancelled),
        }
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

    async fn reject(&self, messages: &[Message]) -> Result<(), MessagingError> {
        let requeued: Vec<Message> = messages.to_vec();
        tokio::time::sleep(self.state.config.reject_delay()).await;
        self.state
            .enqueue(requeued.into_iter().map(QueuedMessage::untracked));
        Ok(())
    }

    async fn dead_letter(
        &self,
        messages: &[Message],
        reason: &str,
        error_description: &str,
    ) -> Result<(), MessagingError> {
        let mut dead_letters = self
            .state
            .dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        dead_letters.extend(messages.iter().map(|message| DeadLetterRecord {
            message: message.clone(),
            reason: reason.to_string(),
            error_description: error_description.to_string(),
        }));
        Ok(())
    }
}
