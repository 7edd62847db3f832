//! Shared doubles for interceptor tests

use crate::client::{message_handler, MessageHandler, MessagePublisher, MessageReceiver};
use crate::error::MessagingError;
use crate::message::Message;
use crate::providers::InMemoryBroker;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const WAIT: Duration = Duration::from_secs(60);

/// Publisher that records every batch it is given
#[derive(Default)]
pub struct RecordingPublisher {
    pub sent: Mutex<Vec<Vec<Message>>>,
}

impl RecordingPublisher {
    pub fn batches(&self) -> Vec<Vec<Message>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn send(&self, messages: Vec<Message>) -> Result<(), MessagingError> {
        self.sent.lock().unwrap().push(messages);
        Ok(())
    }
}

/// Publisher that records every batch and reports the messages at the
/// given batch positions as failed, the way a throttling transport would
pub struct PartiallyFailingPublisher {
    failing_positions: Vec<usize>,
    pub sent: Mutex<Vec<Vec<Message>>>,
}

impl PartiallyFailingPublisher {
    pub fn failing(failing_positions: Vec<usize>) -> Self {
        Self {
            failing_positions,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn batches(&self) -> Vec<Vec<Message>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagePublisher for PartiallyFailingPublisher {
    async fn send(&self, messages: Vec<Message>) -> Result<(), MessagingError> {
        let failed: Vec<Message> = self
            .failing_positions
            .iter()
            .filter_map(|&i| messages.get(i).cloned())
            .collect();
        self.sent.lock().unwrap().push(messages);

        if failed.is_empty() {
            return Ok(());
        }
        Err(MessagingError::PublishFailed {
            failed,
            message: "throttled".to_string(),
        })
    }
}

/// Acknowledgement call observed by a [`RecordingReceiver`]
#[derive(Debug, Clone, PartialEq)]
pub enum Ack {
    Confirm(Vec<Message>),
    Reject(Vec<Message>),
    DeadLetter(Vec<Message>, String),
}

/// Receiver that delivers one scripted batch per listen call and records
/// every acknowledgement
#[derive(Default)]
pub struct RecordingReceiver {
    pub deliveries: Mutex<Vec<Vec<Message>>>,
    pub acks: Mutex<Vec<Ack>>,
    pub handler_results: Mutex<Vec<Result<(), String>>>,
}

impl RecordingReceiver {
    pub fn delivering(batch: Vec<Message>) -> Self {
        Self {
            deliveries: Mutex::new(vec![batch]),
            ..Self::default()
        }
    }

    pub fn acks(&self) -> Vec<Ack> {
        self.acks.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageReceiver for RecordingReceiver {
    async fn message_count(&self) -> Result<u64, MessagingError> {
        Ok(self.deliveries.lock().unwrap().len() as u64)
    }

    async fn listen(
        &self,
        handler: MessageHandler,
        cancel: CancellationToken,
    ) -> Result<(), MessagingError> {
        let batch = self.deliveries.lock().unwrap().pop();
        if let Some(batch) = batch {
            let result = handler(batch, cancel).await.map_err(|e| e.to_string());
            self.handler_results.lock().unwrap().push(result);
        }
        Ok(())
    }

    async fn keep_alive(
        &self,
        _messages: &[Message],
        _time_to_live: Option<Duration>,
    ) -> Result<(), MessagingError> {
        Ok(())
    }

    async fn confirm(&self, messages: &[Message]) -> Result<(), MessagingError> {
        self.acks.lock().unwrap().push(Ack::Confirm(messages.to_vec()));
        Ok(())
    }

    async fn reject(&self, messages: &[Message]) -> Result<(), MessagingError> {
        self.acks.lock().unwrap().push(Ack::Reject(messages.to_vec()));
        Ok(())
    }

    async fn dead_letter(
        &self,
        messages: &[Message],
        reason: &str,
        _error_description: &str,
    ) -> Result<(), MessagingError> {
        self.acks
            .lock()
            .unwrap()
            .push(Ack::DeadLetter(messages.to_vec(), reason.to_string()));
        Ok(())
    }
}

/// Listen on `receiver` in the background, forwarding batches into a channel
pub fn listen_into_channel(
    receiver: Arc<dyn MessageReceiver>,
    cancel: &CancellationToken,
) -> mpsc::UnboundedReceiver<Vec<Message>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = message_handler(move |messages, _| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(messages);
            Ok(())
        }
    });

    let cancel = cancel.clone();
    tokio::spawn(async move { receiver.listen(handler, cancel).await });
    rx
}

/// Wait until the broker has the expected number of listeners
pub async fn wait_for_listeners(broker: &InMemoryBroker, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while broker.listener_count() != expected {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("listeners should register");
}

/// Receive the next batch from a channel fed by [`listen_into_channel`]
pub async fn next_batch(rx: &mut mpsc::UnboundedReceiver<Vec<Message>>) -> Vec<Message> {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("batch should arrive")
        .expect("listener still running")
}
