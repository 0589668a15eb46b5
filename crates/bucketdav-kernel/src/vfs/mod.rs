//! Filesystem emulation over object storage.
//!
//! Object storage has keys, not directories. This module layers a
//! hierarchical view on top of the five storage primitives:
//!
//! - [`MountRegistry`] - Resolves virtual paths to mounts (longest prefix)
//! - [`path`] - Translates mount sub-paths into object keys
//! - [`DirectoryEmulator`] - Directory markers, existence checks, listings
//! - [`TransferEngine`] - Recursive copy/move as per-object fan-out
//! - [`AncestorPropagator`] - Refreshes ancestor directory markers
//! - [`CacheInvalidator`] - Tells listing caches a subtree changed
//!
//! ## Design Decisions
//!
//! - **Markers are tolerated, not required**: a directory with descendants but
//!   no marker still exists ([`DirectoryPresence::ImplicitFromDescendant`]).
//! - **No transactions**: multi-object operations report how far they got
//!   and leave completed objects in place.

pub mod backends;
mod cache;
mod directory;
mod error;
mod mount;
pub mod path;
mod store;
mod timestamps;
mod transfer;
mod types;

pub use backends::{LocalObjectStore, MemoryObjectStore};
pub use cache::{CacheInvalidator, CachedListing, ListingCache, NoopInvalidator};
pub use directory::{Children, DirectoryEmulator, DirectoryPresence, EnsureOutcome};
pub use error::{StoreError, StoreResult};
pub use mount::{MountRegistry, ResolvedPath, Resolution};
pub use store::{
    CopySource, DEFAULT_CONTENT_TYPE, DEFAULT_MAX_KEYS, DIRECTORY_CONTENT_TYPE, ListPage,
    ListRequest, ObjectMeta, ObjectStore,
};
pub use timestamps::AncestorPropagator;
pub use transfer::{TransferDepth, TransferEngine, TransferKind, TransferPlan, TransferReport};
pub use types::{BackendConfig, CopySourceStyle, Mount, MountId};
