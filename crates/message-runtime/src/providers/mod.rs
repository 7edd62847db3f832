//! Transport implementations.
//!
//! This module contains concrete implementations of the `MessagePublisher`
//! and `MessageReceiver` traits.

pub mod memory;
pub mod null;

pub use memory::{DeadLetterRecord, InMemoryBroker};
pub use null::{NullPublisher, NullReceiver};
