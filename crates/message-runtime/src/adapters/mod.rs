//! # Infrastructure Adapters
//!
//! Implementations of the blob container interface.

pub mod filesystem_blob;
pub mod memory_blob;

pub use filesystem_blob::FilesystemBlobContainer;
pub use memory_blob::InMemoryBlobContainer;
