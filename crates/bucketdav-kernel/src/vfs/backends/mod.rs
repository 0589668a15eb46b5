//! Object-store implementations.
//!
//! Backends implement [`ObjectStore`](super::ObjectStore) for different storage types.

mod local;
mod memory;

pub use local::{LocalObjectStore, MARKER_FILE};
pub use memory::{MemoryObjectStore, StoreCall, StoreOp};
