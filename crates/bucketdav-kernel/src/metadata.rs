//! Metadata store: backend configurations and mount usage markers.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::SystemTime;

use crate::vfs::{BackendConfig, MountId};

/// Source of backend configurations and mount bookkeeping.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Backend configuration by identifier.
    async fn backend_config(&self, id: &str) -> Option<BackendConfig>;

    /// Record that a mount was just used.
    async fn touch_mount(&self, mount: &MountId);

    /// When the mount was last used, if ever.
    async fn last_used(&self, mount: &MountId) -> Option<SystemTime>;
}

/// Metadata store over a fixed set of backend configurations.
#[derive(Debug, Default)]
pub struct StaticMetadata {
    backends: HashMap<String, BackendConfig>,
    last_used: DashMap<MountId, SystemTime>,
}

impl StaticMetadata {
    pub fn new(backends: impl IntoIterator<Item = BackendConfig>) -> Self {
        Self {
            backends: backends.into_iter().map(|b| (b.id.clone(), b)).collect(),
            last_used: DashMap::new(),
        }
    }

    /// Add or replace a backend configuration.
    pub fn insert(&mut self, config: BackendConfig) {
        self.backends.insert(config.id.clone(), config);
    }
}

#[async_trait]
impl MetadataStore for StaticMetadata {
    async fn backend_config(&self, id: &str) -> Option<BackendConfig> {
        self.backends.get(id).cloned()
    }

    async fn touch_mount(&self, mount: &MountId) {
        self.last_used.insert(mount.clone(), SystemTime::now());
    }

    async fn last_used(&self, mount: &MountId) -> Option<SystemTime> {
        self.last_used.get(mount).map(|t| *t)
    }
}
