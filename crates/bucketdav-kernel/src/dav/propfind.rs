//! PROPFIND: read-only listings at depth 0, 1 or infinity.
//!
//! The virtual root lists the mounts the principal may read. Inside a mount,
//! depth-1 listings go through the listing cache when one is configured.

use http::StatusCode;
use std::collections::HashMap;
use std::time::SystemTime;

use super::headers::Depth;
use super::{Dav, DavRequest, DavResponse, Target, xml};
use crate::error::{DavError, DavResult};
use crate::principal::{Capability, Principal};
use crate::vfs::{BackendConfig, Children, DirectoryEmulator, ObjectMeta, Resolution, path};

/// Whether an entry is a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Collection,
    File,
}

/// One resource in a PROPFIND result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropEntry {
    /// Virtual path; collections end in `/`.
    pub href: String,
    pub kind: ResourceKind,
    pub size: u64,
    pub last_modified: Option<SystemTime>,
    pub content_type: Option<String>,
}

impl PropEntry {
    pub fn collection(href: impl Into<String>, last_modified: Option<SystemTime>) -> Self {
        Self {
            href: href.into(),
            kind: ResourceKind::Collection,
            size: 0,
            last_modified,
            content_type: None,
        }
    }

    fn file(href: String, meta: &ObjectMeta) -> Self {
        Self {
            href,
            kind: ResourceKind::File,
            size: meta.size,
            last_modified: Some(meta.last_modified),
            content_type: meta.content_type.clone(),
        }
    }

    pub fn is_collection(&self) -> bool {
        self.kind == ResourceKind::Collection
    }

    pub fn display_name(&self) -> String {
        path::file_name(&self.href).to_string()
    }
}

/// Virtual path of `key` inside the mount at `mount_path`.
fn href_for(mount_path: &str, root_key: &str, key: &str) -> String {
    let relative = key.strip_prefix(root_key).unwrap_or(key);
    format!("{mount_path}/{relative}")
}

impl Dav {
    #[tracing::instrument(skip(self, request), name = "dav.propfind", fields(path = %request.path))]
    pub(crate) async fn handle_propfind(&self, request: &DavRequest) -> DavResult<DavResponse> {
        let entries = self.propfind(request).await?;
        let body = xml::multistatus(&entries, &self.settings.base_path);
        Ok(DavResponse::with_body(StatusCode::MULTI_STATUS, body))
    }

    /// Entries a PROPFIND request reports, the resource itself first.
    ///
    /// A missing `Depth` header means infinity.
    pub async fn propfind(&self, request: &DavRequest) -> DavResult<Vec<PropEntry>> {
        let depth = Depth::from_headers(&request.headers)?.unwrap_or(Depth::Infinity);
        match self
            .mounts
            .resolve(&request.path, &request.principal, Capability::Read)
            .await?
        {
            Resolution::Root => Ok(self.root_entries(&request.principal, depth).await),
            Resolution::Mounted(resolved) => {
                let target = self.target(resolved).await?;
                self.mounted_entries(&target, depth).await
            }
        }
    }

    async fn root_entries(&self, principal: &Principal, depth: Depth) -> Vec<PropEntry> {
        let mut entries = vec![PropEntry::collection("/", None)];
        if depth == Depth::Zero {
            return entries;
        }
        for mount in self.mounts.readable_mounts(principal).await {
            let last_used = self.metadata.last_used(&mount.id).await;
            entries.push(PropEntry::collection(format!("{}/", mount.path), last_used));
        }
        entries
    }

    async fn mounted_entries(&self, target: &Target, depth: Depth) -> DavResult<Vec<PropEntry>> {
        let (key, is_directory) = self.existing_resource(target).await?.ok_or_else(|| {
            DavError::not_found(format!("{} does not exist", target.resolved.virtual_path))
        })?;
        let config = &target.config;
        let mount_path = target.resolved.mount.path.as_str();
        let root_key = config.root_key();
        let href = |key: &str| href_for(mount_path, &root_key, key);

        if !is_directory {
            let meta = self.store.head_object(&config.bucket, &key).await?;
            return Ok(vec![PropEntry::file(href(&key), &meta)]);
        }

        let marker_time = if key.is_empty() {
            None
        } else {
            match self.store.head_object(&config.bucket, &key).await {
                Ok(meta) => Some(meta.last_modified),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            }
        };
        let mut entries = vec![PropEntry::collection(href(&key), marker_time)];

        match depth {
            Depth::Zero => {}
            Depth::One => {
                let children = self.children(config, &key).await?;
                entries.extend(
                    children
                        .directories
                        .iter()
                        .map(|d| PropEntry::collection(href(d), None)),
                );
                entries.extend(
                    children
                        .objects
                        .iter()
                        .map(|o| PropEntry::file(href(&o.key), o)),
                );
            }
            Depth::Infinity => {
                let objects = self.directories(config).list_all(&key).await?;
                let markers: HashMap<&str, SystemTime> = objects
                    .iter()
                    .filter(|o| o.is_directory_marker())
                    .map(|o| (o.key.as_str(), o.last_modified))
                    .collect();
                for dir in DirectoryEmulator::implied_directories(&objects, &key) {
                    let modified = markers.get(dir.as_str()).copied();
                    entries.push(PropEntry::collection(href(&dir), modified));
                }
                entries.extend(
                    objects
                        .iter()
                        .filter(|o| !o.is_directory_marker())
                        .map(|o| PropEntry::file(href(&o.key), o)),
                );
            }
        }
        entries[1..].sort_by(|a, b| a.href.cmp(&b.href));
        Ok(entries)
    }

    /// Immediate children of a directory key, through the listing cache.
    async fn children(&self, config: &BackendConfig, key: &str) -> DavResult<Children> {
        let bucket = &config.bucket;
        if let Some(cached) = self.listings.as_ref().and_then(|c| c.get(bucket, key)) {
            return Ok(cached);
        }
        let children = self.directories(config).list_children(key).await?;
        if let Some(cache) = &self.listings {
            cache.insert(&config.bucket, key, children.clone());
        }
        Ok(children)
    }
}
