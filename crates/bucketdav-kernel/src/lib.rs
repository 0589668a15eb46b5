//! # bucketdav-kernel
//!
//! Filesystem semantics over object-storage buckets, for a WebDAV-style
//! authoring protocol.
//!
//! Buckets have keys, not directories. The kernel:
//! - Resolves virtual paths onto mounts, each bound to one bucket and prefix
//! - Emulates directories with zero-length marker objects
//! - Turns recursive COPY/MOVE/DELETE into per-object storage calls
//! - Refreshes ancestor directory markers and invalidates listing caches
//!   after every mutation
//!
//! Storage, metadata, access decisions and caching are collaborators behind
//! traits ([`ObjectStore`], [`MetadataStore`], [`AccessPolicy`],
//! [`CacheInvalidator`]) injected into [`Dav`].

pub mod access;
pub mod config;
pub mod dav;
pub mod error;
pub mod metadata;
pub mod principal;
pub mod vfs;

pub use access::{AccessPolicy, AllowAll, Grant, GrantPolicy};
pub use config::{Config, ConfigError, MountConfig};
pub use dav::{Dav, DavRequest, DavResponse, DavSettings, Depth, PropEntry, ResourceKind};
pub use error::{DavError, DavResult};
pub use metadata::{MetadataStore, StaticMetadata};
pub use principal::{Capability, Principal};
pub use vfs::{
    BackendConfig, CacheInvalidator, CopySourceStyle, ListingCache, LocalObjectStore,
    MemoryObjectStore, Mount, MountId, MountRegistry, NoopInvalidator, ObjectStore, StoreError,
    StoreResult,
};
