//! Ancestor modification-time propagation.
//!
//! Object storage has no directory mtime. A directory's marker object carries
//! one instead, so after a mutation every ancestor marker between the mutated
//! key and the mount root is rewritten. Listings then show the fresh time
//! without rescanning the subtree.
//!
//! Refreshing is best-effort: by the time it runs the mutation has already
//! landed, so a marker that cannot be rewritten is logged and skipped.

use std::sync::Arc;
use tracing::{debug, warn};

use super::directory::DirectoryEmulator;
use super::path;
use super::store::ObjectStore;
use super::types::BackendConfig;

/// Refreshes ancestor directory markers after a mutation.
#[derive(Clone)]
pub struct AncestorPropagator {
    store: Arc<dyn ObjectStore>,
}

impl AncestorPropagator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Rewrite the marker of every ancestor of `key` below the mount root.
    ///
    /// Each level is touched exactly once, nearest first. Returns the keys
    /// that were actually rewritten.
    pub async fn propagate(&self, config: &BackendConfig, key: &str) -> Vec<String> {
        self.propagate_all(config, &[key]).await
    }

    /// Like [`propagate`](Self::propagate) for several mutated keys at once.
    ///
    /// Ancestors shared by more than one key are still touched only once.
    pub async fn propagate_all(
        &self,
        config: &BackendConfig,
        keys: &[&str],
    ) -> Vec<String> {
        let root_key = config.root_key();
        let mut chain: Vec<String> = Vec::new();
        for key in keys {
            for dir in path::ancestor_chain(key, &root_key) {
                if !chain.contains(&dir) {
                    chain.push(dir);
                }
            }
        }

        let dirs = DirectoryEmulator::new(self.store.as_ref(), &config.bucket, 1);
        let mut touched = Vec::with_capacity(chain.len());
        for dir in chain {
            match dirs.put_marker(&dir).await {
                Ok(()) => touched.push(dir),
                Err(e) => warn!(
                    bucket = %config.bucket,
                    key = %dir,
                    error = %e,
                    "directory timestamp not refreshed"
                ),
            }
        }
        debug!(bucket = %config.bucket, levels = touched.len(), "propagated timestamps");
        touched
    }
}
