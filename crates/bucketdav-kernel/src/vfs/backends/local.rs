//! Local-directory object store.
//!
//! Buckets are directories below `root`, object keys map onto relative file
//! paths. A directory marker `a/b/` is a reserved [`MARKER_FILE`] inside
//! `a/b`, so an empty directory survives only while its marker does.
//!
//! Path security is enforced: keys with `.`/`..` components or the reserved
//! marker name are rejected, so no key can reach outside its bucket.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::debug;

use crate::vfs::error::{StoreError, StoreResult, is_missing};
use crate::vfs::path::SEPARATOR;
use crate::vfs::store::{
    CopySource, DEFAULT_CONTENT_TYPE, DIRECTORY_CONTENT_TYPE, ListPage, ListRequest, ObjectMeta,
    ObjectStore,
};

/// File name standing in for a directory marker object.
pub const MARKER_FILE: &str = ".bucketdav-dir";

/// Object store over a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a store rooted at the given directory.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        if bucket.is_empty()
            || bucket.contains(SEPARATOR)
            || bucket == "."
            || bucket == ".."
            || bucket.contains('\\')
        {
            return Err(StoreError::invalid_key(format!("bucket {bucket:?}")));
        }
        Ok(self.root.join(bucket))
    }

    /// Map an object key to the file holding it.
    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        let mut path = self.bucket_dir(bucket)?;
        let (body, is_marker) = match key.strip_suffix(SEPARATOR) {
            Some(body) => (body, true),
            None => (key, false),
        };
        if body.is_empty() {
            return Err(StoreError::invalid_key(key));
        }
        for segment in body.split(SEPARATOR) {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment == MARKER_FILE
                || segment.contains('\\')
            {
                return Err(StoreError::invalid_key(key));
            }
            path.push(segment);
        }
        if is_marker {
            path.push(MARKER_FILE);
        }
        Ok(path)
    }

    fn not_found_as_store(key: &str, err: io::Error) -> StoreError {
        if is_missing(&err) {
            StoreError::not_found(key)
        } else {
            StoreError::from(err)
        }
    }

    fn meta_for(key: &str, meta: &std::fs::Metadata) -> ObjectMeta {
        let content_type = if key.ends_with(SEPARATOR) {
            DIRECTORY_CONTENT_TYPE
        } else {
            DEFAULT_CONTENT_TYPE
        };
        ObjectMeta {
            key: key.to_string(),
            size: meta.len(),
            last_modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            content_type: Some(content_type.to_string()),
        }
    }

    async fn ensure_parent(path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Remove now-empty directories between `path` and the bucket directory.
    async fn prune_empty_dirs(&self, bucket_dir: &Path, path: &Path) {
        let mut current = path.parent().map(Path::to_path_buf);
        while let Some(dir) = current {
            if dir == bucket_dir || !dir.starts_with(bucket_dir) {
                break;
            }
            // Fails (and stops) as soon as a directory still has content
            if fs::remove_dir(&dir).await.is_err() {
                break;
            }
            current = dir.parent().map(Path::to_path_buf);
        }
    }

    /// Whether the subtree under directory key `dir_key` can hold keys
    /// this page still wants.
    fn dir_in_range(dir_key: &str, request: &ListRequest) -> bool {
        let prefix = request.prefix.as_str();
        if !dir_key.starts_with(prefix) && !prefix.starts_with(dir_key) {
            return false;
        }
        match request.continuation_token.as_deref() {
            // Below a key that sorts before the token, everything does too
            Some(token) => dir_key >= token || token.starts_with(dir_key),
            None => true,
        }
    }

    /// Read one directory into walk nodes.
    async fn read_children(dir: &Path, dir_key: &str) -> StoreResult<Vec<Node>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if is_missing(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                let key = format!("{dir_key}{name}{SEPARATOR}");
                children.push(Node::Dir { path, key });
            } else if name != MARKER_FILE {
                let key = format!("{dir_key}{name}");
                children.push(Node::Object { path, key });
            } else if !dir_key.is_empty() {
                let key = dir_key.to_string();
                children.push(Node::Object { path, key });
            }
        }
        Ok(children)
    }

    /// Walk the bucket in key order, collecting the objects one page needs.
    ///
    /// Subtrees outside the prefix or wholly before the continuation token
    /// are never read, and the walk stops one entry past the page limit.
    async fn scan(&self, bucket: &str, request: &ListRequest) -> StoreResult<Vec<ObjectMeta>> {
        let prefix = request.prefix.as_str();
        let limit = request.page_limit();
        let mut found = Vec::new();

        // Start at the deepest directory implied by the prefix
        let dir_part = match prefix.rfind(SEPARATOR) {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let mut start = self.bucket_dir(bucket)?;
        let mut start_key = String::new();
        for segment in dir_part.split(SEPARATOR).filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Ok(found);
            }
            start.push(segment);
            start_key.push_str(segment);
            start_key.push(SEPARATOR);
        }

        let root = Node::Dir {
            path: start,
            key: start_key,
        };
        let mut stack = vec![root];
        let mut entries_seen = 0usize;
        let mut last_group: Option<String> = None;
        while let Some(node) = stack.pop() {
            let (path, key) = match node {
                Node::Dir { path, key } => {
                    if Self::dir_in_range(&key, request) {
                        let mut children = Self::read_children(&path, &key).await?;
                        children.sort_by(|a, b| a.key().cmp(b.key()));
                        stack.extend(children.into_iter().rev());
                    }
                    continue;
                }
                Node::Object { path, key } => (path, key),
            };
            if request.is_before_token(&key) || !key.starts_with(prefix) {
                continue;
            }
            let meta = match fs::metadata(&path).await {
                Ok(meta) => meta,
                Err(e) if is_missing(&e) => continue,
                Err(e) => return Err(e.into()),
            };

            // Keys folded into the previous common prefix are not new entries
            let group = request.common_prefix(&key);
            if group.is_none() || group != last_group {
                entries_seen += 1;
                last_group = group;
            }
            found.push(Self::meta_for(&key, &meta));
            if entries_seen > limit {
                break;
            }
        }
        Ok(found)
    }
}

/// One step of the ordered listing walk.
///
/// Children of a directory are pushed in reverse key order, so popping the
/// stack yields keys in ascending order: a subtree's keys all share its
/// directory key as a prefix and never interleave with a sibling's.
enum Node {
    Dir { path: PathBuf, key: String },
    Object { path: PathBuf, key: String },
}

impl Node {
    fn key(&self) -> &str {
        match self {
            Node::Dir { key, .. } | Node::Object { key, .. } => key,
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMeta> {
        let path = self.object_path(bucket, key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| Self::not_found_as_store(key, e))?;
        // A plain directory is not an object
        if meta.is_dir() {
            return Err(StoreError::not_found(key));
        }
        Ok(Self::meta_for(key, &meta))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> StoreResult<()> {
        let path = self.object_path(bucket, key)?;
        Self::ensure_parent(&path).await?;
        fs::write(&path, body).await?;
        debug!(bucket, key, path = %path.display(), "stored object");
        Ok(())
    }

    async fn copy_object(
        &self,
        bucket: &str,
        source: &CopySource,
        dest_key: &str,
    ) -> StoreResult<()> {
        let source = CopySource::parse(&source.header_value())?;
        let from = self.object_path(source.bucket(), source.key())?;
        let to = self.object_path(bucket, dest_key)?;
        let is_file = fs::metadata(&from).await.is_ok_and(|m| m.is_file());
        if !is_file {
            return Err(StoreError::not_found(source.key()));
        }
        Self::ensure_parent(&to).await?;
        fs::copy(&from, &to)
            .await
            .map_err(|e| Self::not_found_as_store(source.key(), e))?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let path = self.object_path(bucket, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if is_missing(&e) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        let bucket_dir = self.bucket_dir(bucket)?;
        self.prune_empty_dirs(&bucket_dir, &path).await;
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, request: &ListRequest) -> StoreResult<ListPage> {
        let found = self.scan(bucket, request).await?;
        Ok(ListPage::from_sorted(found, request))
    }
}
