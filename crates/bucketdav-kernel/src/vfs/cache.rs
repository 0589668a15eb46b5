//! Listing cache and invalidation.
//!
//! Verb handlers never talk to a cache directly; they signal changed subtrees
//! through [`CacheInvalidator`] once per successful mutation.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use super::directory::Children;
use super::types::{BackendConfig, MountId};

/// Receives "this subtree changed" notifications.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Drop anything cached at or below `subtree_key`.
    async fn invalidate(
        &self,
        subtree_key: &str,
        config: &BackendConfig,
        is_directory: bool,
        mount: &MountId,
    );
}

/// Invalidator for deployments without a cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInvalidator;

#[async_trait]
impl CacheInvalidator for NoopInvalidator {
    async fn invalidate(&self, _: &str, _: &BackendConfig, _: bool, _: &MountId) {}
}

/// One cached directory listing.
#[derive(Debug, Clone)]
pub struct CachedListing {
    pub children: Children,
    cached_at: Instant,
}

impl CachedListing {
    fn is_stale(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// In-process cache of directory listings, keyed by bucket and directory key.
///
/// Thread-safe via DashMap. Entries expire after a TTL and are dropped on
/// invalidation.
#[derive(Debug)]
pub struct ListingCache {
    entries: DashMap<(String, String), CachedListing>,
    ttl: Duration,
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingCache {
    /// Default TTL: 5 minutes.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    pub fn new() -> Self {
        Self::with_ttl(Self::DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cached children of `key`, if present and fresh. A stale entry is
    /// dropped on the way out.
    pub fn get(&self, bucket: &str, key: &str) -> Option<Children> {
        let cache_key = (bucket.to_string(), key.to_string());
        let entry = self.entries.get(&cache_key)?;
        if !entry.is_stale(self.ttl) {
            return Some(entry.children.clone());
        }
        drop(entry);
        // A fresh insert since the read survives
        self.entries
            .remove_if(&cache_key, |_, entry| entry.is_stale(self.ttl));
        None
    }

    pub fn insert(&self, bucket: &str, key: &str, children: Children) {
        self.entries.insert(
            (bucket.to_string(), key.to_string()),
            CachedListing {
                children,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry of `bucket` below `key`, and the listings of its
    /// ancestors, which name it as a child.
    pub fn invalidate_subtree(&self, bucket: &str, key: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(b, k), _| {
            !(b == bucket && (k.starts_with(key) || key.starts_with(k.as_str())))
        });
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl CacheInvalidator for ListingCache {
    async fn invalidate(
        &self,
        subtree_key: &str,
        config: &BackendConfig,
        is_directory: bool,
        mount: &MountId,
    ) {
        let dropped = self.invalidate_subtree(&config.bucket, subtree_key);
        debug!(
            mount = %mount,
            bucket = %config.bucket,
            key = subtree_key,
            is_directory,
            dropped,
            "listing cache invalidated"
        );
    }
}
