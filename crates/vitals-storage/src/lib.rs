//! In-memory metric storage and its disk snapshot manager.

#![warn(clippy::all)]

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::{SnapshotError, SnapshotManager};
