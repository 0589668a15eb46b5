//! Mount and backend configuration types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::path;
use super::store::CopySource;

/// Stable identifier of a mount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountId(String);

impl MountId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A virtual path prefix bound to one backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Mount identifier.
    pub id: MountId,
    /// Normalized virtual path (leading `/`, no trailing `/`), e.g. `/media`.
    pub path: String,
    /// Identifier of the [`BackendConfig`] serving this mount.
    pub backend_id: String,
}

impl Mount {
    /// Create a mount. The path is normalized.
    pub fn new(id: MountId, path: &str, backend_id: impl Into<String>) -> Self {
        Self {
            id,
            path: path::normalize_mount_path(path),
            backend_id: backend_id.into(),
        }
    }
}

/// How a backend expects the copy-source identifier to be laid out.
///
/// Some providers want `bucket/key`, others insist on a leading separator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopySourceStyle {
    /// `bucket/key`
    #[default]
    BucketRelative,
    /// `/bucket/key`
    Absolute,
}

/// Backend storage configuration for a mount.
///
/// Looked up once per request and treated as immutable for its duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Configuration identifier referenced by mounts.
    pub id: String,
    /// Bucket (container) name.
    pub bucket: String,
    /// Key prefix every object of this backend lives under. May be empty.
    #[serde(default)]
    pub root_prefix: String,
    /// Reference to the credentials the storage client should use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,
    /// Provider quirk: copy-source layout.
    #[serde(default)]
    pub copy_source_style: CopySourceStyle,
}

impl BackendConfig {
    /// Create a config with an empty root prefix.
    pub fn new(id: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bucket: bucket.into(),
            root_prefix: String::new(),
            credential_ref: None,
            copy_source_style: CopySourceStyle::default(),
        }
    }

    /// Set the root key prefix.
    pub fn with_root_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.root_prefix = prefix.into();
        self
    }

    /// Set the credential reference.
    pub fn with_credential_ref(mut self, credential_ref: impl Into<String>) -> Self {
        self.credential_ref = Some(credential_ref.into());
        self
    }

    /// Set the copy-source style.
    pub fn with_copy_source_style(mut self, style: CopySourceStyle) -> Self {
        self.copy_source_style = style;
        self
    }

    /// Object key of the mount root (`""` or `"prefix/"`).
    pub fn root_key(&self) -> String {
        path::mount_root_key(&self.root_prefix)
    }

    /// Translate a mount sub-path into this backend's key space.
    pub fn object_key(&self, sub_path: &str, is_directory: bool) -> String {
        path::object_key(&self.root_prefix, sub_path, is_directory)
    }

    /// Copy-source identifier for `key` in this backend's bucket.
    pub fn copy_source(&self, key: &str) -> CopySource {
        CopySource::new(&self.bucket, key, self.copy_source_style)
    }
}
