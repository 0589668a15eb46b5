//! TOML configuration: backends, mounts, grants and tuning knobs.
//!
//! ```toml
//! base_path = "/dav"
//! transfer_concurrency = 8
//!
//! [[backends]]
//! id = "media"
//! bucket = "media-bucket"
//! root_prefix = "tenants/acme"
//!
//! [[mounts]]
//! path = "/media"
//! backend = "media"
//!
//! [[grants]]
//! principal = "amy"
//! mount = "*"
//! capability = "operate"
//! ```

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::access::{ANY_MOUNT, AccessPolicy, Grant, GrantPolicy};
use crate::dav::DavSettings;
use crate::error::DavResult;
use crate::metadata::StaticMetadata;
use crate::vfs::{BackendConfig, Mount, MountId, MountRegistry, path};

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// One `[[mounts]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountConfig {
    /// Generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub path: String,
    /// Backend configuration id.
    pub backend: String,
}

/// Whole configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// URL prefix stripped from `Destination` headers.
    #[serde(default)]
    pub base_path: String,
    #[serde(default = "default_transfer_concurrency")]
    pub transfer_concurrency: usize,
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
    /// Root directory of the local object store (CLI).
    #[serde(default)]
    pub store_root: Option<PathBuf>,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
    #[serde(default)]
    pub grants: Vec<Grant>,
}

fn default_transfer_concurrency() -> usize {
    8
}

fn default_list_page_size() -> usize {
    crate::vfs::DEFAULT_MAX_KEYS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            transfer_concurrency: default_transfer_concurrency(),
            list_page_size: default_list_page_size(),
            store_root: None,
            backends: Vec::new(),
            mounts: Vec::new(),
            grants: Vec::new(),
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    /// Parse and validate a TOML document.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validated()
    }
}

impl Config {
    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Normalize paths, fill generated ids, clamp knobs and check references.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.base_path = normalize_base_path(&self.base_path);
        self.transfer_concurrency = self.transfer_concurrency.max(1);
        self.list_page_size = self.list_page_size.max(1);

        let mut backend_ids = HashSet::new();
        for backend in &self.backends {
            if backend.bucket.is_empty() {
                return Err(ConfigError::invalid(format!("backend {} has no bucket", backend.id)));
            }
            if !backend_ids.insert(backend.id.as_str()) {
                return Err(ConfigError::invalid(format!("duplicate backend id {}", backend.id)));
            }
        }

        let mut paths = HashSet::new();
        let mut mount_ids = HashSet::new();
        for mount in &mut self.mounts {
            mount.path = path::normalize_mount_path(&mount.path);
            if mount.path == "/" {
                return Err(ConfigError::invalid("the virtual root cannot be mounted"));
            }
            let id = mount
                .id
                .get_or_insert_with(|| MountId::generate().to_string())
                .clone();
            if !paths.insert(mount.path.clone()) {
                return Err(ConfigError::invalid(format!("duplicate mount path {}", mount.path)));
            }
            if !mount_ids.insert(id.clone()) {
                return Err(ConfigError::invalid(format!("duplicate mount id {}", id)));
            }
            if !backend_ids.contains(mount.backend.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "mount {} references unknown backend {}",
                    mount.path, mount.backend
                )));
            }
        }

        for grant in &self.grants {
            if grant.mount != ANY_MOUNT && !mount_ids.contains(&grant.mount) {
                return Err(ConfigError::invalid(format!(
                    "grant for {} references unknown mount {}",
                    grant.principal, grant.mount
                )));
            }
        }

        Ok(self)
    }

    /// Mounts as registry entries.
    pub fn mount_entries(&self) -> Vec<Mount> {
        self.mounts
            .iter()
            .map(|m| {
                let id = m
                    .id
                    .as_deref()
                    .map(MountId::new)
                    .unwrap_or_else(MountId::generate);
                Mount::new(id, &m.path, m.backend.clone())
            })
            .collect()
    }

    /// Access policy built from the grants. Anything not granted is denied.
    pub fn access_policy(&self) -> Arc<dyn AccessPolicy> {
        Arc::new(GrantPolicy::new(self.grants.clone()))
    }

    /// Metadata store over the configured backends.
    pub fn metadata(&self) -> StaticMetadata {
        StaticMetadata::new(self.backends.iter().cloned())
    }

    /// Registry holding every configured mount.
    pub async fn registry(&self, access: Arc<dyn AccessPolicy>) -> DavResult<MountRegistry> {
        let registry = MountRegistry::new(access);
        for mount in self.mount_entries() {
            registry.mount(mount).await?;
        }
        Ok(registry)
    }

    /// Verb handler tuning.
    pub fn settings(&self) -> DavSettings {
        DavSettings {
            base_path: self.base_path.clone(),
            transfer_concurrency: self.transfer_concurrency,
            list_page_size: self.list_page_size,
        }
    }
}

/// `""` and `"/"` mean no prefix; anything else becomes `/a/b`.
fn normalize_base_path(base: &str) -> String {
    let normalized = path::normalize_mount_path(base);
    if normalized == "/" { String::new() } else { normalized }
}
