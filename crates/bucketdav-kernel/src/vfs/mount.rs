//! Mount registry with longest-prefix resolution.
//!
//! Resolves a virtual path to the mount serving it and the sub-path below
//! that mount, checking the caller's capability on the way.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::path;
use super::types::Mount;
use crate::access::AccessPolicy;
use crate::error::{DavError, DavResult};
use crate::principal::{Capability, Principal};

/// A virtual path resolved onto a mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub mount: Arc<Mount>,
    /// Remainder below the mount path, without leading separator.
    pub sub_path: String,
    /// The normalized virtual path that was resolved.
    pub virtual_path: String,
    /// Request path ended in a separator, or names the mount itself.
    pub is_directory: bool,
}

impl ResolvedPath {
    /// Returns true if the path names the mount root.
    pub fn is_mount_root(&self) -> bool {
        self.sub_path.is_empty()
    }
}

/// Outcome of [`MountRegistry::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The virtual root. Not mutable; callers must reject mutations.
    Root,
    /// A path inside a mount.
    Mounted(ResolvedPath),
}

/// Holds the configured mounts and resolves virtual paths against them.
///
/// Mount points are matched by longest prefix. If `/media` and
/// `/media/archive` are both mounted, `/media/archive/2020/a.jpg` resolves to
/// the `/media/archive` mount.
pub struct MountRegistry {
    /// Mounts keyed by normalized path.
    mounts: RwLock<BTreeMap<String, Arc<Mount>>>,
    access: Arc<dyn AccessPolicy>,
}

impl std::fmt::Debug for MountRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountRegistry")
            .field("mounts", &"<locked>")
            .finish()
    }
}

impl MountRegistry {
    /// Create an empty registry using `access` for capability checks.
    pub fn new(access: Arc<dyn AccessPolicy>) -> Self {
        Self {
            mounts: RwLock::new(BTreeMap::new()),
            access,
        }
    }

    /// Add a mount, replacing any mount at the same path.
    ///
    /// The virtual root is reserved and cannot be mounted.
    pub async fn mount(&self, mount: Mount) -> DavResult<()> {
        if mount.path == "/" {
            return Err(DavError::forbidden("the virtual root cannot be mounted"));
        }
        let mut mounts = self.mounts.write().await;
        debug!(mount = %mount.id, path = %mount.path, "mounted");
        mounts.insert(mount.path.clone(), Arc::new(mount));
        Ok(())
    }

    /// Remove the mount at `path`. Returns `true` if one was removed.
    pub async fn unmount(&self, path: &str) -> bool {
        let path = path::normalize_mount_path(path);
        let mut mounts = self.mounts.write().await;
        mounts.remove(&path).is_some()
    }

    /// All mounts, ordered by path.
    pub async fn list_mounts(&self) -> Vec<Arc<Mount>> {
        let mounts = self.mounts.read().await;
        mounts.values().cloned().collect()
    }

    /// Mounts the principal may read, ordered by path.
    pub async fn readable_mounts(&self, principal: &Principal) -> Vec<Arc<Mount>> {
        let mounts = self.mounts.read().await;
        mounts
            .values()
            .filter(|m| self.access.allows(principal, m, Capability::Read))
            .cloned()
            .collect()
    }

    /// Resolve a virtual path for a principal needing `capability`.
    ///
    /// Fails with `NotFound` if no mount matches and `Forbidden` if the
    /// principal lacks the capability on the matching mount. The virtual
    /// root resolves to [`Resolution::Root`] without a capability check.
    pub async fn resolve(
        &self,
        virtual_path: &str,
        principal: &Principal,
        capability: Capability,
    ) -> DavResult<Resolution> {
        let resolution = self.locate(virtual_path).await?;
        if let Resolution::Mounted(resolved) = &resolution {
            let mount = &resolved.mount;
            if !self.access.allows(principal, mount, capability) {
                return Err(DavError::forbidden(format!(
                    "{} lacks {} access to {}",
                    principal.username, capability, mount.path
                )));
            }
        }
        Ok(resolution)
    }

    /// Resolve a virtual path to its mount without any capability check.
    pub async fn locate(&self, virtual_path: &str) -> DavResult<Resolution> {
        let normalized = path::normalize_virtual(virtual_path);
        if normalized == "/" {
            return Ok(Resolution::Root);
        }
        let trimmed = normalized.trim_end_matches(path::SEPARATOR);

        let mounts = self.mounts.read().await;

        // Find longest matching mount point
        let mut best_match: Option<&Arc<Mount>> = None;
        for (mount_path, mount) in mounts.iter() {
            let is_match = trimmed == mount_path.as_str()
                || trimmed.starts_with(&format!("{}/", mount_path));
            let longer = best_match.is_none_or(|best| mount_path.len() > best.path.len());
            if is_match && longer {
                best_match = Some(mount);
            }
        }

        let mount = best_match
            .cloned()
            .ok_or_else(|| DavError::not_found(format!("no mount for {}", normalized)))?;
        drop(mounts);

        let sub_path = trimmed
            .strip_prefix(mount.path.as_str())
            .unwrap_or("")
            .trim_start_matches(path::SEPARATOR)
            .to_string();
        let is_directory = path::is_directory_path(&normalized) || sub_path.is_empty();

        Ok(Resolution::Mounted(ResolvedPath {
            mount,
            sub_path,
            virtual_path: normalized,
            is_directory,
        }))
    }

    /// Like [`resolve`](Self::resolve), but the virtual root is `Forbidden`.
    pub async fn resolve_mounted(
        &self,
        virtual_path: &str,
        principal: &Principal,
        capability: Capability,
    ) -> DavResult<ResolvedPath> {
        match self.resolve(virtual_path, principal, capability).await? {
            Resolution::Root => Err(DavError::forbidden("the virtual root is not mutable")),
            Resolution::Mounted(resolved) => Ok(resolved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AllowAll, Grant, GrantPolicy};
    use crate::vfs::MountId;

    fn mount(id: &str, path: &str) -> Mount {
        Mount::new(MountId::new(id), path, "backend")
    }

    async fn registry() -> MountRegistry {
        let registry = MountRegistry::new(Arc::new(AllowAll));
        registry.mount(mount("media", "/media")).await.unwrap();
        let archive = mount("archive", "/media/archive");
        registry.mount(archive).await.unwrap();
        registry.mount(mount("docs", "/docs")).await.unwrap();
        registry
    }

    fn mounted(resolution: Resolution) -> ResolvedPath {
        match resolution {
            Resolution::Mounted(r) => r,
            Resolution::Root => panic!("resolved to root"),
        }
    }

    async fn resolve_read(registry: &MountRegistry, path: &str) -> ResolvedPath {
        let p = Principal::named("amy");
        mounted(registry.resolve(path, &p, Capability::Read).await.unwrap())
    }

    #[tokio::test]
    async fn test_resolve_basic() {
        let registry = registry().await;

        let r = resolve_read(&registry, "/docs/a/b.txt").await;
        assert_eq!(r.mount.id.as_str(), "docs");
        assert_eq!(r.sub_path, "a/b.txt");
        assert!(!r.is_directory);

        let r = resolve_read(&registry, "/docs//a/").await;
        assert_eq!(r.sub_path, "a");
        assert!(r.is_directory);
    }

    #[tokio::test]
    async fn test_nested_mount_shadows_parent() {
        let registry = registry().await;

        let r = resolve_read(&registry, "/media/archive/2020/a.jpg").await;
        assert_eq!(r.mount.id.as_str(), "archive");
        assert_eq!(r.sub_path, "2020/a.jpg");

        let r = resolve_read(&registry, "/media/archived.jpg").await;
        assert_eq!(r.mount.id.as_str(), "media");
        assert_eq!(r.sub_path, "archived.jpg");
    }

    #[tokio::test]
    async fn test_mount_root_is_directory() {
        let registry = registry().await;
        let r = resolve_read(&registry, "/media").await;
        assert!(r.is_mount_root());
        assert!(r.is_directory);
    }

    #[tokio::test]
    async fn test_resolve_root_and_unknown() {
        let registry = registry().await;
        let p = Principal::named("amy");
        let operate = Capability::Operate;
        let root = registry.resolve("/", &p, operate).await.unwrap();
        assert_eq!(root, Resolution::Root);
        let root = registry.resolve("//", &p, operate).await.unwrap();
        assert_eq!(root, Resolution::Root);

        let err = registry
            .resolve("/nothing/here", &p, Capability::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, DavError::NotFound(_)));

        let err = registry
            .resolve_mounted("/", &p, Capability::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, DavError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_resolution_is_deterministic() {
        let registry = registry().await;
        let a = resolve_read(&registry, "/media/x/y/").await;
        let b = resolve_read(&registry, "/media/x/y/").await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_capability_checked() {
        let policy = GrantPolicy::new(vec![Grant::new("bob", "docs", Capability::Read)]);
        let registry = MountRegistry::new(Arc::new(policy));
        registry.mount(mount("docs", "/docs")).await.unwrap();
        let bob = Principal::named("bob");

        let read = registry.resolve("/docs/a", &bob, Capability::Read).await;
        assert!(read.is_ok());
        let err = registry
            .resolve("/docs/a", &bob, Capability::Operate)
            .await
            .unwrap_err();
        assert!(matches!(err, DavError::Forbidden(_)));

        assert_eq!(registry.readable_mounts(&bob).await.len(), 1);
        let eve = Principal::named("eve");
        assert!(registry.readable_mounts(&eve).await.is_empty());

        // Lookup alone ignores capabilities
        let located = registry.locate("/docs/a").await.unwrap();
        assert!(matches!(located, Resolution::Mounted(_)));
    }

    #[tokio::test]
    async fn test_root_cannot_be_mounted_and_unmount() {
        let registry = registry().await;
        assert!(registry.mount(mount("root", "/")).await.is_err());

        assert!(registry.unmount("/docs/").await);
        assert!(!registry.unmount("/docs").await);
        assert_eq!(registry.list_mounts().await.len(), 2);
    }
}
