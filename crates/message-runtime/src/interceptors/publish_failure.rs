//! Publish failures reported against transformed copies are mapped back
//! onto the messages the caller handed in, so a caller retrying the failed
//! subset through the same interceptor chain never transforms a message twice.

use crate::error::MessagingError;
use crate::message::Message;

#[cfg(test)]
#[path = "publish_failure_tests.rs"]
mod tests;

/// Positions in `sent` of the messages named by a failed subset.
///
/// Each failed message claims the first unclaimed position holding an equal
/// message. Returns `None` when a failed message matches no position.
fn failed_positions(failed: &[Message], sent: &[Message]) -> Option<Vec<usize>> {
    let mut claimed = vec![false; sent.len()];
    let mut positions = Vec::with_capacity(failed.len());

    for message in failed {
        let position = (0..sent.len()).find(|&i| !claimed[i] && sent[i] == *message)?;
        claimed[position] = true;
        positions.push(position);
    }

    positions.sort_unstable();
    Some(positions)
}

/// Rewrite an error from sending `sent` so a failed subset carries the
/// matching entries of `originals`, where `sent[i]` was derived from
/// `originals[i]`.
///
/// Also returns the failed batch positions. An unmatched subset and any
/// error other than [`MessagingError::PublishFailed`] count as the whole
/// batch failing; the latter is returned unchanged.
pub(crate) fn restore_originals(
    error: MessagingError,
    sent: &[Message],
    originals: &[Message],
) -> (MessagingError, Vec<usize>) {
    match error {
        MessagingError::PublishFailed { failed, message } => {
            let positions = failed_positions(&failed, sent)
                .unwrap_or_else(|| (0..originals.len()).collect());
            let failed = positions
                .iter()
                .filter_map(|&i| originals.get(i).cloned())
                .collect();
            (MessagingError::PublishFailed { failed, message }, positions)
        }
        other => (other, (0..originals.len()).collect()),
    }
}
