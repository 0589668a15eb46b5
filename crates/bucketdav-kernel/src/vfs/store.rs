//! Object-storage client contract.
//!
//! The kernel only ever talks to storage through these five primitives.
//! Keys are backend-native strings; a key ending in `/` is a directory marker.

use async_trait::async_trait;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::time::SystemTime;

use super::error::{StoreError, StoreResult};
use super::path::SEPARATOR;
use super::types::CopySourceStyle;

/// Content type of zero-length directory marker objects.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/x-directory";

/// Content type reported for objects stored without one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Page size used when a listing does not ask for one.
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// Characters escaped in a copy-source key. `/` stays literal.
const COPY_SOURCE_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Metadata of one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: SystemTime,
    pub content_type: Option<String>,
}

impl ObjectMeta {
    /// Returns true if the key denotes a directory marker.
    pub fn is_directory_marker(&self) -> bool {
        self.key.ends_with(SEPARATOR)
    }
}

/// Parameters of one `list_objects` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Only keys starting with this prefix are listed.
    pub prefix: String,
    /// Token returned by the previous page.
    pub continuation_token: Option<String>,
    /// Maximum number of entries (objects plus common prefixes).
    pub max_keys: Option<usize>,
    /// Group keys sharing the prefix up to this character.
    pub delimiter: Option<char>,
}

impl ListRequest {
    /// List everything under `prefix`.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Largest number of entries one page may hold.
    pub fn page_limit(&self) -> usize {
        self.max_keys.unwrap_or(DEFAULT_MAX_KEYS).max(1)
    }

    /// True if `key` was already returned by an earlier page.
    pub fn is_before_token(&self, key: &str) -> bool {
        self.continuation_token
            .as_deref()
            .is_some_and(|token| key <= token)
    }

    /// The common prefix `key` is grouped under, if the delimiter applies.
    ///
    /// `key` must start with the request prefix.
    pub fn common_prefix(&self, key: &str) -> Option<String> {
        let rest = &key[self.prefix.len()..];
        let delimiter = self.delimiter?;
        let end = rest.find(delimiter)? + delimiter.len_utf8();
        Some(format!("{}{}", self.prefix, &rest[..end]))
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectMeta>,
    /// Grouped key prefixes when a delimiter was requested.
    pub common_prefixes: Vec<String>,
    /// Present when more results follow.
    pub next_token: Option<String>,
}

impl ListPage {
    /// Build a page from objects sorted by key.
    ///
    /// Applies prefix filtering, continuation-token (start-after) semantics,
    /// delimiter grouping and `max_keys`. Shared by the bundled stores.
    pub fn from_sorted<I>(objects: I, request: &ListRequest) -> Self
    where
        I: IntoIterator<Item = ObjectMeta>,
    {
        let max_keys = request.page_limit();
        let mut page = ListPage::default();
        let mut count = 0usize;
        let mut last_key: Option<String> = None;
        let mut truncated = false;

        for meta in objects {
            if request.is_before_token(&meta.key) || !meta.key.starts_with(&request.prefix) {
                continue;
            }

            match request.common_prefix(&meta.key) {
                Some(common) => {
                    if page.common_prefixes.last() == Some(&common) {
                        // Same group as the previous key; consume it silently.
                        last_key = Some(meta.key);
                        continue;
                    }
                    if count == max_keys {
                        truncated = true;
                        break;
                    }
                    page.common_prefixes.push(common);
                }
                None => {
                    if count == max_keys {
                        truncated = true;
                        break;
                    }
                    last_key = Some(meta.key.clone());
                    page.objects.push(meta);
                    count += 1;
                    continue;
                }
            }
            count += 1;
            last_key = Some(meta.key);
        }

        if truncated {
            page.next_token = last_key;
        }
        page
    }
}

/// Positional copy-source identifier: bucket plus percent-encoded key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySource {
    bucket: String,
    key: String,
    style: CopySourceStyle,
}

impl CopySource {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, style: CopySourceStyle) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            style,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The decoded source key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn style(&self) -> CopySourceStyle {
        self.style
    }

    /// Render the identifier as sent to the backend.
    pub fn header_value(&self) -> String {
        let encoded = utf8_percent_encode(&self.key, COPY_SOURCE_ENCODE_SET);
        match self.style {
            CopySourceStyle::BucketRelative => format!("{}/{}", self.bucket, encoded),
            CopySourceStyle::Absolute => format!("/{}/{}", self.bucket, encoded),
        }
    }

    /// Parse a rendered identifier back into bucket and decoded key.
    pub fn parse(value: &str) -> StoreResult<Self> {
        let (style, rest) = match value.strip_prefix(SEPARATOR) {
            Some(rest) => (CopySourceStyle::Absolute, rest),
            None => (CopySourceStyle::BucketRelative, value),
        };
        let (bucket, encoded) = rest
            .split_once(SEPARATOR)
            .ok_or_else(|| StoreError::invalid_copy_source(value))?;
        if bucket.is_empty() || encoded.is_empty() {
            return Err(StoreError::invalid_copy_source(value));
        }
        let key = percent_decode_str(encoded)
            .decode_utf8()
            .map_err(|_| StoreError::invalid_copy_source(value))?;
        Ok(Self::new(bucket, key.into_owned(), style))
    }
}

impl std::fmt::Display for CopySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.header_value())
    }
}

/// Object-storage client.
///
/// Implementations must report a missing object as [`StoreError::NotFound`]
/// (or an `Io` error of kind `NotFound`), distinct from other failures.
/// Timeouts and retries belong to the implementation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch object metadata.
    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMeta>;

    /// Store an object, replacing any existing one.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> StoreResult<()>;

    /// Server-side copy of `source` to `dest_key` in `bucket`.
    async fn copy_object(
        &self,
        bucket: &str,
        source: &CopySource,
        dest_key: &str,
    ) -> StoreResult<()>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// List one page of keys.
    async fn list_objects(&self, bucket: &str, request: &ListRequest) -> StoreResult<ListPage>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check whether an object exists, keeping non-404 failures as errors.
    async fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        match self.head_object(bucket, key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
