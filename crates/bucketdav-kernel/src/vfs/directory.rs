//! Directory emulation over flat object keys.
//!
//! Directories are zero-length marker objects whose key ends in `/`. Object
//! storage does not enforce markers, so a directory may also exist only
//! implicitly through its descendants.

use tracing::{debug, warn};

use super::error::StoreResult;
use super::path::{self, SEPARATOR};
use super::store::{DIRECTORY_CONTENT_TYPE, ListRequest, ObjectMeta, ObjectStore};

/// How a directory key is backed in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryPresence {
    /// A marker object exists for the key.
    ExplicitMarker,
    /// No marker, but at least one object lives below the key.
    ImplicitFromDescendant,
    /// Nothing at or below the key.
    Absent,
}

impl DirectoryPresence {
    pub fn exists(self) -> bool {
        !matches!(self, DirectoryPresence::Absent)
    }
}

/// Outcome of [`DirectoryEmulator::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// A marker object was written.
    Created,
    /// A marker object was already there.
    AlreadyExists,
    /// Nothing to do (the key is the bucket or mount root), or the attempt
    /// failed and was deliberately ignored.
    Skipped,
}

/// Immediate children of a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children {
    /// Objects directly below the directory, excluding its own marker.
    pub objects: Vec<ObjectMeta>,
    /// Sub-directory keys (with trailing separator).
    pub directories: Vec<String>,
    /// The directory's own marker, if it has one.
    pub marker: Option<ObjectMeta>,
}

/// Directory operations against one bucket.
pub struct DirectoryEmulator<'a> {
    store: &'a dyn ObjectStore,
    bucket: &'a str,
    page_size: usize,
}

impl<'a> DirectoryEmulator<'a> {
    pub fn new(store: &'a dyn ObjectStore, bucket: &'a str, page_size: usize) -> Self {
        Self {
            store,
            bucket,
            page_size: page_size.max(1),
        }
    }

    /// Determine whether a directory key exists, and how.
    ///
    /// The empty key is the bucket itself and always exists.
    pub async fn presence(&self, key: &str) -> StoreResult<DirectoryPresence> {
        if key.is_empty() {
            return Ok(DirectoryPresence::ExplicitMarker);
        }
        if self.store.object_exists(self.bucket, key).await? {
            return Ok(DirectoryPresence::ExplicitMarker);
        }
        let request = ListRequest::prefix(key).with_max_keys(1);
        let page = self.store.list_objects(self.bucket, &request).await?;
        if page.objects.is_empty() && page.common_prefixes.is_empty() {
            Ok(DirectoryPresence::Absent)
        } else {
            Ok(DirectoryPresence::ImplicitFromDescendant)
        }
    }

    /// Write a marker for `key` unless one already exists.
    pub async fn ensure(&self, key: &str) -> StoreResult<EnsureOutcome> {
        if key.is_empty() {
            return Ok(EnsureOutcome::Skipped);
        }
        if self.store.object_exists(self.bucket, key).await? {
            return Ok(EnsureOutcome::AlreadyExists);
        }
        self.put_marker(key).await?;
        debug!(bucket = self.bucket, key, "created directory marker");
        Ok(EnsureOutcome::Created)
    }

    /// Best-effort [`ensure`](Self::ensure) for a parent directory.
    ///
    /// Keys at or above `root_key` are skipped. Failures are logged and
    /// reported as `Skipped`: some backends materialize directories from
    /// descendant keys on their own, so callers carry on regardless.
    pub async fn ensure_best_effort(&self, key: &str, root_key: &str) -> EnsureOutcome {
        if key.len() <= root_key.len() {
            return EnsureOutcome::Skipped;
        }
        match self.ensure(key).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(bucket = self.bucket, key, error = %e, "could not create directory marker");
                EnsureOutcome::Skipped
            }
        }
    }

    /// Write (or rewrite) the zero-length marker for `key`.
    pub async fn put_marker(&self, key: &str) -> StoreResult<()> {
        self.store
            .put_object(self.bucket, key, Vec::new(), DIRECTORY_CONTENT_TYPE)
            .await
    }

    /// Every object whose key starts with `prefix`, following continuation
    /// tokens until the listing is exhausted.
    pub async fn list_all(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        let mut objects = Vec::new();
        let mut token = None;
        loop {
            let request = ListRequest::prefix(prefix)
                .with_max_keys(self.page_size)
                .with_token(token);
            let page = self.store.list_objects(self.bucket, &request).await?;
            objects.extend(page.objects);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(objects)
    }

    /// Immediate children of the directory `key`.
    pub async fn list_children(&self, key: &str) -> StoreResult<Children> {
        let mut children = Children::default();
        let mut token = None;
        loop {
            let request = ListRequest::prefix(key)
                .with_max_keys(self.page_size)
                .with_delimiter(SEPARATOR)
                .with_token(token);
            let page = self.store.list_objects(self.bucket, &request).await?;
            for object in page.objects {
                if object.key == key {
                    children.marker = Some(object);
                } else {
                    children.objects.push(object);
                }
            }
            children.directories.extend(page.common_prefixes);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(children)
    }

    /// Directory keys a flat object listing implies, markers or not.
    ///
    /// Used to report implicit directories in recursive listings.
    pub fn implied_directories(objects: &[ObjectMeta], base: &str) -> Vec<String> {
        let mut dirs: Vec<String> = objects
            .iter()
            .flat_map(|o| path::ancestor_chain(&o.key, base))
            .chain(
                objects
                    .iter()
                    .filter(|o| o.is_directory_marker() && o.key != base)
                    .map(|o| o.key.clone()),
            )
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}
