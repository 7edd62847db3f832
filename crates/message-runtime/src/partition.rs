//! Partition-ordered parallel processing of a received batch.
//!
//! Items are grouped by a partition key. Each group keeps the relative order
//! of the input and is handed to the processing function in a single call;
//! different groups are processed concurrently by a fixed number of workers.
//! Nothing here confirms or rejects messages.

use crate::error::{MessagingError, ValidationError};
use crate::message::Message;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

#[cfg(test)]
#[path = "partition_tests.rs"]
mod tests;

/// Process messages grouped by partition key.
///
/// Equivalent to [`process_by_partition_key_with`] with an identity
/// transform.
///
/// # Examples
///
/// ```rust
/// use message_runtime::partition::process_by_partition_key;
/// use message_runtime::Message;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), message_runtime::MessagingError> {
/// let messages = vec![
///     Message::new("1").with_partition_id("a"),
///     Message::new("2").with_partition_id("b"),
///     Message::new("3").with_partition_id("a"),
/// ];
///
/// process_by_partition_key(
///     messages,
///     |message| message.partition_id().map(str::to_string),
///     |partition| async move {
///         println!("processing {} message(s) in order", partition.len());
///         Ok(())
///     },
///     4,
///     CancellationToken::new(),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn process_by_partition_key<K, S, F, Fut>(
    messages: Vec<Message>,
    key_selector: S,
    process: F,
    parallelization: usize,
    cancel: CancellationToken,
) -> Result<(), MessagingError>
where
    K: Eq + Hash,
    S: Fn(&Message) -> K,
    F: Fn(Vec<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), MessagingError>> + Send + 'static,
{
    process_by_partition_key_with(
        messages,
        |message| message,
        key_selector,
        process,
        parallelization,
        cancel,
    )
    .await
}

/// Transform messages, group them by partition key and process each group
/// with bounded concurrency.
///
/// Exactly `parallelization` workers are started. Each repeatedly takes one
/// partition group and awaits `process` for it before taking the next, so
/// every key is processed by exactly one call that sees its items in input
/// order.
///
/// # Errors
///
/// - [`MessagingError::Validation`] if `parallelization` is zero
/// - the first error returned by `process`; the failing worker stops while
///   the remaining workers finish the queue
/// - [`MessagingError::Cancelled`] if `cancel` fires; workers check it
///   before taking each group
/// - [`MessagingError::Internal`] if `process` panics
pub async fn process_by_partition_key_with<T, K, X, S, F, Fut>(
    messages: Vec<Message>,
    transform: X,
    key_selector: S,
    process: F,
    parallelization: usize,
    cancel: CancellationToken,
) -> Result<(), MessagingError>
where
    T: Send + 'static,
    K: Eq + Hash,
    X: Fn(Message) -> T,
    S: Fn(&T) -> K,
    F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), MessagingError>> + Send + 'static,
{
    if parallelization == 0 {
        return Err(ValidationError::OutOfRange {
            field: "parallelization".to_string(),
            message: "must be greater than zero".to_string(),
        }
        .into());
    }

    let items = messages.into_iter().map(transform);
    let groups = group_by_key(items, key_selector);
    debug!(
        partition_count = groups.len(),
        parallelization, "Processing partitions"
    );

    let queue = Arc::new(Mutex::new(VecDeque::from(groups)));
    let process = Arc::new(process);

    let mut workers = JoinSet::new();
    for _ in 0..parallelization {
        workers.spawn(run_worker(
            Arc::clone(&queue),
            Arc::clone(&process),
            cancel.clone(),
        ));
    }

    let mut first_error = None;
    while let Some(joined) = workers.join_next().await {
        let outcome = joined.unwrap_or_else(|e| {
            error!(error = %e, "Partition worker panicked");
            Err(MessagingError::Internal {
                message: format!("Partition worker failed: {}", e),
            })
        });

        if let Err(e) = outcome {
            first_error.get_or_insert(e);
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// Group items by key, keeping groups in order of first appearance and
/// items in input order within each group
fn group_by_key<T, K, S>(items: impl IntoIterator<Item = T>, key_selector: S) -> Vec<Vec<T>>
where
    K: Eq + Hash,
    S: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Vec<T>> = Vec::new();

    for item in items {
        match index.entry(key_selector(&item)) {
            Entry::Occupied(entry) => groups[*entry.get()].push(item),
            Entry::Vacant(entry) => {
                entry.insert(groups.len());
                groups.push(vec![item]);
            }
        }
    }

    groups
}

async fn run_worker<T, F, Fut>(
    queue: Arc<Mutex<VecDeque<Vec<T>>>>,
    process: Arc<F>,
    cancel: CancellationToken,
) -> Result<(), MessagingError>
where
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = Result<(), MessagingError>>,
{
    loop {
        if cancel.is_cancelled() {
            return Err(MessagingError::Cancelled);
        }

        let next = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(partition) => process(partition).await?,
            None => return Ok(()),
        }
    }
}
