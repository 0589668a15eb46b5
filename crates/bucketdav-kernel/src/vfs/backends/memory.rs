//! In-memory object store.
//!
//! Used for testing and ephemeral mounts. All data is lost when dropped.
//! Every call is recorded and failures can be injected per operation and key,
//! which lets tests observe exactly what the kernel asked of storage.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::SystemTime;

use crate::vfs::error::{StoreError, StoreResult};
use crate::vfs::store::{CopySource, ListPage, ListRequest, ObjectMeta, ObjectStore};

/// Storage primitive, used for call recording and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StoreOp {
    Head,
    Put,
    Copy,
    Delete,
    List,
}

/// One recorded storage call.
///
/// For `Copy` the key is the *source* key; for `List` it is the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub bucket: String,
    pub key: String,
    /// Destination key of a copy.
    pub dest: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    last_modified: SystemTime,
}

impl StoredObject {
    fn meta(&self, key: &str) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            size: self.data.len() as u64,
            last_modified: self.last_modified,
            content_type: Some(self.content_type.clone()),
        }
    }
}

/// In-memory, multi-bucket object store.
///
/// Buckets spring into existence on first write. Thread-safe via internal
/// locks.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
    calls: Mutex<Vec<StoreCall>>,
    failures: Mutex<HashSet<(StoreOp, String)>>,
}

impl MemoryObjectStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object directly, bypassing call recording.
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>, content_type: &str) {
        let mut buckets = self.buckets.write();
        buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
                last_modified: SystemTime::now(),
            },
        );
    }

    /// Read an object's bytes directly, bypassing call recording.
    pub fn object_data(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let buckets = self.buckets.read();
        buckets.get(bucket)?.get(key).map(|o| o.data.clone())
    }

    /// All keys of a bucket, in order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let buckets = self.buckets.read();
        buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Make every future `op` on `key` fail with a backend error.
    pub fn fail_on(&self, op: StoreOp, key: impl Into<String>) {
        self.failures.lock().insert((op, key.into()));
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Calls recorded so far for one operation.
    pub fn calls_of(&self, op: StoreOp) -> Vec<StoreCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, op: StoreOp, bucket: &str, key: &str, dest: Option<&str>) -> StoreResult<()> {
        self.calls.lock().push(StoreCall {
            op,
            bucket: bucket.to_string(),
            key: key.to_string(),
            dest: dest.map(str::to_string),
        });
        if self.failures.lock().contains(&(op, key.to_string())) {
            return Err(StoreError::other(format!("injected {} failure on {}", op, key)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMeta> {
        self.record(StoreOp::Head, bucket, key, None)?;
        let buckets = self.buckets.read();
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|o| o.meta(key))
            .ok_or_else(|| StoreError::not_found(key))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> StoreResult<()> {
        self.record(StoreOp::Put, bucket, key, None)?;
        if key.is_empty() {
            return Err(StoreError::invalid_key(key));
        }
        self.insert(bucket, key, body, content_type);
        Ok(())
    }

    async fn copy_object(
        &self,
        bucket: &str,
        source: &CopySource,
        dest_key: &str,
    ) -> StoreResult<()> {
        // Exercise the wire form so encoding bugs surface here too
        let source = CopySource::parse(&source.header_value())?;
        self.record(StoreOp::Copy, bucket, source.key(), Some(dest_key))?;

        let mut buckets = self.buckets.write();
        let object = buckets
            .get(source.bucket())
            .and_then(|objects| objects.get(source.key()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(source.key()))?;

        let copied = StoredObject {
            last_modified: SystemTime::now(),
            ..object
        };
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(dest_key.to_string(), copied);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.record(StoreOp::Delete, bucket, key, None)?;
        let mut buckets = self.buckets.write();
        if let Some(objects) = buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, request: &ListRequest) -> StoreResult<ListPage> {
        self.record(StoreOp::List, bucket, &request.prefix, None)?;
        let buckets = self.buckets.read();
        let Some(objects) = buckets.get(bucket) else {
            return Ok(ListPage::default());
        };

        let start = match &request.continuation_token {
            Some(token) if token.as_str() >= request.prefix.as_str() => token.clone(),
            _ => request.prefix.clone(),
        };
        let candidates = objects
            .range(start..)
            .take_while(|(key, _)| key.starts_with(&request.prefix))
            .map(|(key, object)| object.meta(key));
        Ok(ListPage::from_sorted(candidates, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::types::CopySourceStyle;

    #[tokio::test]
    async fn test_put_and_head() {
        let store = MemoryObjectStore::new();
        store
            .put_object("b", "a/file.txt", b"hello".to_vec(), "text/plain")
            .await
            .unwrap();

        let meta = store.head_object("b", "a/file.txt").await.unwrap();
        assert_eq!(meta.size, 5);
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        assert!(!meta.is_directory_marker());

        let missing = store.head_object("b", "a/other.txt").await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_copy_with_encoded_source() {
        let store = MemoryObjectStore::new();
        store.insert("b", "dir/my file?.txt", b"data".to_vec(), "text/plain");

        let source = CopySource::new("b", "dir/my file?.txt", CopySourceStyle::Absolute);
        store
            .copy_object("b", &source, "copy/my file?.txt")
            .await
            .unwrap();

        let data = Some(b"data".to_vec());
        assert_eq!(store.object_data("b", "copy/my file?.txt"), data);
        assert_eq!(store.object_data("b", "dir/my file?.txt"), data);
    }

    #[tokio::test]
    async fn test_copy_missing_source_is_not_found() {
        let store = MemoryObjectStore::new();
        let source = CopySource::new("b", "nope", CopySourceStyle::BucketRelative);
        let err = store.copy_object("b", &source, "x").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryObjectStore::new();
        store.insert("b", "k", b"v".to_vec(), "text/plain");
        store.delete_object("b", "k").await.unwrap();
        store.delete_object("b", "k").await.unwrap();
        assert!(store.keys("b").is_empty());
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = MemoryObjectStore::new();
        for i in 0..5 {
            store.insert("b", &format!("p/{i}"), Vec::new(), "text/plain");
        }
        store.insert("b", "q/0", Vec::new(), "text/plain");

        let mut token = None;
        let mut seen = Vec::new();
        loop {
            let request = ListRequest::prefix("p/").with_max_keys(2).with_token(token);
            let page = store.list_objects("b", &request).await.unwrap();
            seen.extend(page.objects.into_iter().map(|o| o.key));
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        assert_eq!(seen, vec!["p/0", "p/1", "p/2", "p/3", "p/4"]);
    }

    #[tokio::test]
    async fn test_injected_failure_and_recording() {
        let store = MemoryObjectStore::new();
        store.fail_on(StoreOp::Put, "bad");

        assert!(store.put_object("b", "bad", Vec::new(), "x").await.is_err());
        store.put_object("b", "ok", Vec::new(), "x").await.unwrap();

        let puts = store.calls_of(StoreOp::Put);
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].key, "bad");

        store.clear_failures();
        store.put_object("b", "bad", Vec::new(), "x").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_unknown_bucket_is_empty() {
        let store = MemoryObjectStore::new();
        let request = ListRequest::prefix("");
        let page = store.list_objects("nope", &request).await.unwrap();
        assert!(page.objects.is_empty());
        assert!(page.next_token.is_none());
    }
}
