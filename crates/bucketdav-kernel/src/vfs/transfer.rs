//! Recursive object transfer.
//!
//! Object storage has no rename and no directory copy, so both are emulated
//! one object at a time: enumerate everything under the source prefix, then
//! copy (or copy and delete) each object to the same relative key under the
//! destination prefix.
//!
//! Nothing here is transactional. When a transfer stops partway, objects
//! already written at the destination stay there.

use futures::{TryStreamExt, stream};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use super::directory::{DirectoryEmulator, DirectoryPresence};
use super::error::StoreError;
use super::store::ObjectStore;
use super::types::BackendConfig;
use crate::error::{DavError, DavResult};

/// Per-object operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TransferKind {
    Copy,
    /// Copy, then delete the source.
    Move,
}

/// How much of a directory a transfer covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDepth {
    /// Only the directory marker itself.
    SelfOnly,
    /// The directory and everything below it.
    Recursive,
}

/// Computed list of object pairs for one operation. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub kind: TransferKind,
    pub depth: TransferDepth,
    pub overwrite: bool,
    /// `(source_key, dest_key)` in execution order.
    pub pairs: Vec<(String, String)>,
    /// Destination directory marker to materialize after the pairs.
    pub dest_marker: Option<String>,
}

/// What a finished transfer did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Objects transferred (or removed).
    pub objects: usize,
    /// A destination marker was written by the engine itself.
    pub marker_created: bool,
}

/// Executes copy, move and removal across one backend.
pub struct TransferEngine<'a> {
    store: &'a dyn ObjectStore,
    config: &'a BackendConfig,
    page_size: usize,
    concurrency: usize,
}

impl<'a> TransferEngine<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        config: &'a BackendConfig,
        page_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            config,
            page_size: page_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    fn directories(&self) -> DirectoryEmulator<'a> {
        DirectoryEmulator::new(self.store, &self.config.bucket, self.page_size)
    }

    /// Transfer one file. No enumeration.
    pub async fn transfer_file(
        &self,
        kind: TransferKind,
        source_key: &str,
        dest_key: &str,
    ) -> DavResult<TransferReport> {
        self.transfer_one(kind, source_key, dest_key)
            .await
            .map_err(DavError::from)?;
        Ok(TransferReport {
            objects: 1,
            marker_created: false,
        })
    }

    /// Build the plan for a directory transfer.
    ///
    /// Recursive plans enumerate every object under `source_prefix`. An empty
    /// enumeration falls back to checking the bare marker: absent means the
    /// source does not exist, present means an empty directory. Copying an
    /// empty directory only creates the destination marker; moving one moves
    /// the marker, so the source marker is gone afterwards.
    pub async fn plan(
        &self,
        kind: TransferKind,
        source_prefix: &str,
        dest_prefix: &str,
        depth: TransferDepth,
        overwrite: bool,
    ) -> DavResult<TransferPlan> {
        let mut plan = TransferPlan {
            kind,
            depth,
            overwrite,
            pairs: Vec::new(),
            dest_marker: None,
        };

        // A moved marker must also leave the source; the bucket root never moves
        let movable = kind == TransferKind::Move && !source_prefix.is_empty();
        match depth {
            TransferDepth::SelfOnly => {
                let presence = self.directories().presence(source_prefix).await?;
                match presence {
                    DirectoryPresence::Absent => {
                        return Err(DavError::not_found("source directory does not exist"));
                    }
                    DirectoryPresence::ExplicitMarker if movable => {
                        plan.pairs.push(marker_pair(source_prefix, dest_prefix));
                    }
                    _ => plan.dest_marker = Some(dest_prefix.to_string()),
                }
            }
            TransferDepth::Recursive => {
                let objects = self.directories().list_all(source_prefix).await?;
                let listed_marker = objects.iter().any(|o| o.key == source_prefix);
                // Some stores leave a marker out of its own listing
                let unlisted_marker = !listed_marker
                    && (objects.is_empty() || kind == TransferKind::Move)
                    && self.has_marker(source_prefix).await?;
                if objects.is_empty() && !unlisted_marker {
                    return Err(DavError::not_found("source directory does not exist"));
                }

                for object in objects {
                    let relative = &object.key[source_prefix.len()..];
                    let target = format!("{}{}", dest_prefix, relative);
                    plan.pairs.push((object.key, target));
                }
                if kind == TransferKind::Move {
                    // Files first, then markers deepest first, so an aborted
                    // move never leaves a source file under a deleted marker.
                    plan.pairs.sort_by(|(a, _), (b, _)| {
                        let (a_dir, b_dir) = (a.ends_with('/'), b.ends_with('/'));
                        a_dir.cmp(&b_dir).then_with(|| {
                            if a_dir {
                                b.len().cmp(&a.len())
                            } else {
                                std::cmp::Ordering::Equal
                            }
                        })
                    });
                }

                if unlisted_marker && movable {
                    // The shallowest marker, so it goes last
                    plan.pairs.push(marker_pair(source_prefix, dest_prefix));
                } else if !listed_marker {
                    plan.dest_marker = Some(dest_prefix.to_string());
                }
            }
        }
        Ok(plan)
    }

    /// Whether `prefix` has a marker object. The bucket root always does.
    async fn has_marker(&self, prefix: &str) -> Result<bool, StoreError> {
        if prefix.is_empty() {
            return Ok(true);
        }
        self.store.object_exists(&self.config.bucket, prefix).await
    }

    /// Execute a plan.
    ///
    /// Copies fan out up to the configured concurrency; moves run one object
    /// at a time so the first failure stops all further source deletions.
    pub async fn execute(&self, plan: &TransferPlan) -> DavResult<TransferReport> {
        let objects = match plan.kind {
            TransferKind::Copy => self.copy_all(&plan.pairs).await?,
            TransferKind::Move => self.move_all(&plan.pairs).await?,
        };

        let mut marker_created = false;
        if let Some(marker) = &plan.dest_marker {
            self.directories()
                .put_marker(marker)
                .await
                .map_err(|e| partial_or_plain(objects, marker, e))?;
            marker_created = true;
        }

        info!(
            kind = %plan.kind,
            bucket = %self.config.bucket,
            objects,
            "transfer complete"
        );
        Ok(TransferReport {
            objects,
            marker_created,
        })
    }

    /// Plan and execute a directory transfer.
    pub async fn transfer_directory(
        &self,
        kind: TransferKind,
        source_prefix: &str,
        dest_prefix: &str,
        depth: TransferDepth,
        overwrite: bool,
    ) -> DavResult<TransferReport> {
        let plan = self
            .plan(kind, source_prefix, dest_prefix, depth, overwrite)
            .await?;
        debug!(
            source = source_prefix,
            dest = dest_prefix,
            pairs = plan.pairs.len(),
            "transfer planned"
        );
        self.execute(&plan).await
    }

    /// Remove a directory: every object under `prefix` when recursive,
    /// otherwise only its marker.
    pub async fn remove_directory(
        &self,
        prefix: &str,
        depth: TransferDepth,
    ) -> DavResult<TransferReport> {
        let bucket = &self.config.bucket;
        let keys: Vec<String> = match depth {
            TransferDepth::SelfOnly => {
                if !self.store.object_exists(bucket, prefix).await? {
                    return Err(DavError::not_found("directory marker does not exist"));
                }
                vec![prefix.to_string()]
            }
            TransferDepth::Recursive => {
                let objects = self.directories().list_all(prefix).await?;
                if objects.is_empty() {
                    if !self.store.object_exists(bucket, prefix).await? {
                        return Err(DavError::not_found("directory does not exist"));
                    }
                    vec![prefix.to_string()]
                } else {
                    objects.into_iter().map(|o| o.key).collect()
                }
            }
        };

        let removed = AtomicUsize::new(0);
        let result = stream::iter(keys.iter().map(Ok::<_, (String, StoreError)>))
            .try_for_each_concurrent(self.concurrency, |key| {
                let removed = &removed;
                async move {
                    self.store
                        .delete_object(bucket, key)
                        .await
                        .map_err(|e| (key.clone(), e))?;
                    removed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        let objects = removed.load(Ordering::SeqCst);
        if let Err((key, e)) = result {
            warn!(
                bucket = %bucket,
                key = %key,
                objects,
                error = %e,
                "removal stopped"
            );
            return Err(partial_or_plain(objects, &key, e));
        }
        Ok(TransferReport {
            objects,
            marker_created: false,
        })
    }

    async fn transfer_one(
        &self,
        kind: TransferKind,
        source_key: &str,
        dest_key: &str,
    ) -> Result<(), StoreError> {
        let source = self.config.copy_source(source_key);
        self.store
            .copy_object(&self.config.bucket, &source, dest_key)
            .await?;
        if kind == TransferKind::Move {
            self.store
                .delete_object(&self.config.bucket, source_key)
                .await?;
        }
        Ok(())
    }

    async fn copy_all(&self, pairs: &[(String, String)]) -> DavResult<usize> {
        let copied = AtomicUsize::new(0);
        let result = stream::iter(pairs.iter().map(Ok::<_, (String, StoreError)>))
            .try_for_each_concurrent(self.concurrency, |(source, dest)| {
                let copied = &copied;
                async move {
                    self.transfer_one(TransferKind::Copy, source, dest)
                        .await
                        .map_err(|e| (source.clone(), e))?;
                    copied.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        let objects = copied.load(Ordering::SeqCst);
        match result {
            Ok(()) => Ok(objects),
            Err((key, e)) => {
                warn!(
                    bucket = %self.config.bucket,
                    key = %key,
                    objects,
                    error = %e,
                    "copy stopped"
                );
                Err(partial_or_plain(objects, &key, e))
            }
        }
    }

    async fn move_all(&self, pairs: &[(String, String)]) -> DavResult<usize> {
        let mut moved = 0;
        for (source, dest) in pairs {
            if let Err(e) = self.transfer_one(TransferKind::Move, source, dest).await {
                warn!(
                    bucket = %self.config.bucket,
                    key = %source,
                    moved,
                    error = %e,
                    "move aborted; remaining sources left in place"
                );
                return Err(partial_or_plain(moved, source, e));
            }
            moved += 1;
        }
        Ok(moved)
    }
}

fn marker_pair(source_prefix: &str, dest_prefix: &str) -> (String, String) {
    (source_prefix.to_string(), dest_prefix.to_string())
}

/// A failure after some progress is partial; before any, it is the error itself.
fn partial_or_plain(completed: usize, key: &str, e: StoreError) -> DavError {
    if completed == 0 {
        DavError::from(e)
    } else {
        DavError::PartialFailure {
            completed,
            failed_key: key.to_string(),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::{MemoryObjectStore, StoreOp};
    use crate::vfs::error::StoreResult;
    use crate::vfs::store::{CopySource, DIRECTORY_CONTENT_TYPE, ListPage, ListRequest, ObjectMeta};
    use async_trait::async_trait;

    /// Memory store whose listings leave out the marker equal to the prefix,
    /// the way some object stores do.
    struct UnlistedMarkers(MemoryObjectStore);

    #[async_trait]
    impl ObjectStore for UnlistedMarkers {
        async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMeta> {
            self.0.head_object(bucket, key).await
        }

        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            body: Vec<u8>,
            content_type: &str,
        ) -> StoreResult<()> {
            self.0.put_object(bucket, key, body, content_type).await
        }

        async fn copy_object(
            &self,
            bucket: &str,
            source: &CopySource,
            dest_key: &str,
        ) -> StoreResult<()> {
            self.0.copy_object(bucket, source, dest_key).await
        }

        async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
            self.0.delete_object(bucket, key).await
        }

        async fn list_objects(&self, bucket: &str, request: &ListRequest) -> StoreResult<ListPage> {
            let mut page = self.0.list_objects(bucket, request).await?;
            page.objects.retain(|o| o.key != request.prefix);
            Ok(page)
        }
    }

    fn config() -> BackendConfig {
        BackendConfig::new("b", "bucket")
    }

    fn seeded() -> MemoryObjectStore {
        let store = MemoryObjectStore::new();
        store.insert("bucket", "src/", Vec::new(), DIRECTORY_CONTENT_TYPE);
        store.insert("bucket", "src/a.txt", b"a".to_vec(), "text/plain");
        store.insert("bucket", "src/sub/b.txt", b"b".to_vec(), "text/plain");
        store
    }

    /// Recursive transfer with overwrite.
    async fn transfer(
        engine: &TransferEngine<'_>,
        kind: TransferKind,
        from: &str,
        to: &str,
    ) -> DavResult<TransferReport> {
        let depth = TransferDepth::Recursive;
        engine.transfer_directory(kind, from, to, depth, true).await
    }

    #[tokio::test]
    async fn test_recursive_copy_preserves_relative_paths() {
        let store = seeded();
        let config = config();
        let engine = TransferEngine::new(&store, &config, 2, 4);

        let report = transfer(&engine, TransferKind::Copy, "src/", "dst/")
            .await
            .unwrap();
        assert_eq!(report.objects, 3);
        assert!(!report.marker_created);
        let data = |key: &str| store.object_data("bucket", key);
        assert_eq!(data("dst/a.txt"), Some(b"a".to_vec()));
        assert_eq!(data("dst/sub/b.txt"), Some(b"b".to_vec()));
        assert!(data("dst/").is_some());
        // Source untouched
        assert_eq!(data("src/a.txt"), Some(b"a".to_vec()));
    }

    #[tokio::test]
    async fn test_self_only_creates_marker_only() {
        let store = seeded();
        let config = config();
        let engine = TransferEngine::new(&store, &config, 100, 4);

        let depth = TransferDepth::SelfOnly;
        let report = engine
            .transfer_directory(TransferKind::Copy, "src/", "dst/", depth, true)
            .await
            .unwrap();
        assert!(report.marker_created);
        let keys = store.keys("bucket");
        assert_eq!(keys.iter().filter(|k| k.starts_with("dst/")).count(), 1);
        assert!(store.calls_of(StoreOp::Copy).is_empty());
    }

    #[tokio::test]
    async fn test_self_only_move_takes_the_marker() {
        let store = seeded();
        let config = config();
        let engine = TransferEngine::new(&store, &config, 100, 4);

        let depth = TransferDepth::SelfOnly;
        let plan = engine
            .plan(TransferKind::Move, "src/", "dst/", depth, true)
            .await
            .unwrap();
        assert_eq!(plan.pairs, vec![("src/".to_string(), "dst/".to_string())]);
        assert!(plan.dest_marker.is_none());
    }

    #[tokio::test]
    async fn test_empty_directory_fallback() {
        let store = MemoryObjectStore::new();
        let config = config();
        let engine = TransferEngine::new(&store, &config, 100, 4);

        let err = transfer(&engine, TransferKind::Copy, "gone/", "dst/")
            .await
            .unwrap_err();
        let expected = "source directory does not exist";
        assert!(matches!(err, DavError::NotFound(ref m) if m == expected));

        store.insert("bucket", "empty/", Vec::new(), DIRECTORY_CONTENT_TYPE);
        let report = transfer(&engine, TransferKind::Copy, "empty/", "dst/")
            .await
            .unwrap();
        assert_eq!(report.objects, 1);
        assert!(store.object_data("bucket", "dst/").is_some());
    }

    #[tokio::test]
    async fn test_empty_directory_with_unlisted_marker() {
        let inner = MemoryObjectStore::new();
        inner.insert("bucket", "empty/", Vec::new(), DIRECTORY_CONTENT_TYPE);
        let store = UnlistedMarkers(inner);
        let config = config();
        let engine = TransferEngine::new(&store, &config, 100, 4);

        let report = transfer(&engine, TransferKind::Copy, "empty/", "copied/")
            .await
            .unwrap();
        assert!(report.marker_created);
        assert!(store.0.object_data("bucket", "empty/").is_some());
        assert!(store.0.object_data("bucket", "copied/").is_some());

        let report = transfer(&engine, TransferKind::Move, "empty/", "moved/")
            .await
            .unwrap();
        assert_eq!(report.objects, 1);
        assert!(!report.marker_created);
        assert_eq!(store.0.keys("bucket"), vec!["copied/", "moved/"]);

        let err = transfer(&engine, TransferKind::Move, "empty/", "again/")
            .await
            .unwrap_err();
        assert!(matches!(err, DavError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_move_with_unlisted_marker_moves_it_last() {
        let store = UnlistedMarkers(seeded());
        let config = config();
        let engine = TransferEngine::new(&store, &config, 100, 4);

        let depth = TransferDepth::Recursive;
        let plan = engine
            .plan(TransferKind::Move, "src/", "dst/", depth, true)
            .await
            .unwrap();
        let sources: Vec<_> = plan.pairs.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(sources, vec!["src/a.txt", "src/sub/b.txt", "src/"]);
        assert!(plan.dest_marker.is_none());

        engine.execute(&plan).await.unwrap();
        let keys = store.0.keys("bucket");
        assert_eq!(keys, vec!["dst/", "dst/a.txt", "dst/sub/b.txt"]);
    }

    #[tokio::test]
    async fn test_copy_failure_reports_partial() {
        let store = seeded();
        store.fail_on(StoreOp::Copy, "src/sub/b.txt");
        let config = config();
        // Sequential so the failing object is reached after the others
        let engine = TransferEngine::new(&store, &config, 100, 1);

        let err = transfer(&engine, TransferKind::Copy, "src/", "dst/")
            .await
            .unwrap_err();
        match err {
            DavError::PartialFailure {
                completed,
                failed_key,
                ..
            } => {
                assert_eq!(completed, 2);
                assert_eq!(failed_key, "src/sub/b.txt");
            }
            other => panic!("unexpected {other:?}"),
        }
        // No rollback
        assert!(store.object_data("bucket", "dst/a.txt").is_some());
    }

    #[tokio::test]
    async fn test_move_orders_markers_last() {
        let store = seeded();
        let config = config();
        let engine = TransferEngine::new(&store, &config, 100, 4);

        let depth = TransferDepth::Recursive;
        let plan = engine
            .plan(TransferKind::Move, "src/", "dst/", depth, true)
            .await
            .unwrap();
        let sources: Vec<_> = plan.pairs.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(sources, vec!["src/a.txt", "src/sub/b.txt", "src/"]);

        engine.execute(&plan).await.unwrap();
        assert!(store.keys("bucket").iter().all(|k| k.starts_with("dst/")));
    }

    #[tokio::test]
    async fn test_file_transfer_uses_encoded_source() {
        let store = MemoryObjectStore::new();
        store.insert("bucket", "a b#.txt", b"x".to_vec(), "text/plain");
        let config = config();
        let engine = TransferEngine::new(&store, &config, 100, 4);

        engine
            .transfer_file(TransferKind::Move, "a b#.txt", "c d#.txt")
            .await
            .unwrap();
        assert_eq!(store.keys("bucket"), vec!["c d#.txt"]);
        assert!(store.calls_of(StoreOp::List).is_empty());
    }

    #[tokio::test]
    async fn test_remove_directory() {
        let store = seeded();
        let config = config();
        let engine = TransferEngine::new(&store, &config, 100, 4);

        let depth = TransferDepth::SelfOnly;
        let report = engine.remove_directory("src/", depth).await.unwrap();
        assert_eq!(report.objects, 1);
        assert_eq!(store.keys("bucket").len(), 2);

        let depth = TransferDepth::Recursive;
        let report = engine.remove_directory("src/", depth).await.unwrap();
        assert_eq!(report.objects, 2);
        assert!(store.keys("bucket").is_empty());

        let err = engine.remove_directory("src/", depth).await.unwrap_err();
        assert!(matches!(err, DavError::NotFound(_)));
    }
}
