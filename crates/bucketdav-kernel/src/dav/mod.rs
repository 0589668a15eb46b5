//! Protocol verb handlers.
//!
//! [`Dav`] owns the collaborators every verb needs and dispatches a
//! [`DavRequest`] to the matching handler. Handlers return [`DavResult`];
//! [`Dav::handle`] turns errors into responses through
//! [`DavError::status`], the single translation path.
//!
//! Every mutating verb follows the same sequence: resolve, translate, check,
//! transfer, then propagate ancestor timestamps, invalidate the cache and
//! mark the mount as used.

mod copy;
mod delete;
pub mod headers;
mod mkcol;
mod propfind;
mod xml;

use http::{HeaderMap, HeaderValue, Method, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{DavError, DavResult};
use crate::metadata::MetadataStore;
use crate::principal::Principal;
use crate::vfs::{
    AncestorPropagator, BackendConfig, CacheInvalidator, DirectoryEmulator, ListingCache,
    MountRegistry, ObjectStore, ResolvedPath, TransferEngine,
};

pub use headers::Depth;
pub use propfind::{PropEntry, ResourceKind};

/// Tuning shared by all handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavSettings {
    /// URL prefix the server is mounted under, stripped from `Destination`.
    pub base_path: String,
    /// Bounded fan-out for recursive copies.
    pub transfer_concurrency: usize,
    /// Page size requested from `list_objects`.
    pub list_page_size: usize,
}

impl Default for DavSettings {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            transfer_concurrency: 8,
            list_page_size: crate::vfs::DEFAULT_MAX_KEYS,
        }
    }
}

/// One protocol request.
#[derive(Debug, Clone)]
pub struct DavRequest {
    pub method: Method,
    /// Virtual path, already stripped of the base path and percent-decoded.
    pub path: String,
    pub headers: HeaderMap,
    pub principal: Principal,
}

impl DavRequest {
    pub fn new(method: Method, path: impl Into<String>, principal: Principal) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            principal,
        }
    }

    /// Request with an extension method such as `COPY` or `PROPFIND`.
    pub fn named(method: &str, path: impl Into<String>, principal: Principal) -> DavResult<Self> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| DavError::bad_request(format!("invalid method {method}")))?;
        Ok(Self::new(method, path, principal))
    }

    /// Add a header. Invalid values are rejected as `BadRequest`.
    pub fn with_header(mut self, name: &'static str, value: &str) -> DavResult<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|_| DavError::bad_request(format!("invalid {name} header value")))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

/// Outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavResponse {
    pub status: StatusCode,
    pub body: Option<String>,
}

impl DavResponse {
    pub fn empty(status: StatusCode) -> Self {
        Self { status, body: None }
    }

    pub fn with_body(status: StatusCode, body: String) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    /// Response for a handler error. The body carries the error message.
    pub fn from_error(error: &DavError) -> Self {
        Self::with_body(error.status(), error.to_string())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// A resolved path together with its backend and object key.
#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub resolved: ResolvedPath,
    pub config: BackendConfig,
    pub key: String,
}

impl Target {
    pub fn is_directory(&self) -> bool {
        self.resolved.is_directory
    }
}

/// Verb dispatcher with injected collaborators.
pub struct Dav {
    mounts: Arc<MountRegistry>,
    metadata: Arc<dyn MetadataStore>,
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CacheInvalidator>,
    listings: Option<Arc<ListingCache>>,
    propagator: AncestorPropagator,
    settings: DavSettings,
}

impl Dav {
    pub fn new(
        mounts: Arc<MountRegistry>,
        metadata: Arc<dyn MetadataStore>,
        store: Arc<dyn ObjectStore>,
        cache: Arc<dyn CacheInvalidator>,
        settings: DavSettings,
    ) -> Self {
        Self {
            mounts,
            metadata,
            propagator: AncestorPropagator::new(store.clone()),
            store,
            cache,
            listings: None,
            settings,
        }
    }

    /// Serve PROPFIND listings from `cache` and invalidate it on mutation.
    pub fn with_listing_cache(mut self, cache: Arc<ListingCache>) -> Self {
        let invalidator: Arc<dyn CacheInvalidator> = cache.clone();
        self.cache = invalidator;
        self.listings = Some(cache);
        self
    }

    /// Build everything from a loaded configuration over `store`.
    pub async fn from_config(config: &Config, store: Arc<dyn ObjectStore>) -> DavResult<Self> {
        let mounts = config.registry(config.access_policy()).await?;
        let listings = Arc::new(ListingCache::new());
        Ok(Self::new(
            Arc::new(mounts),
            Arc::new(config.metadata()),
            store,
            listings.clone(),
            config.settings(),
        )
        .with_listing_cache(listings))
    }

    pub fn mounts(&self) -> &Arc<MountRegistry> {
        &self.mounts
    }

    pub fn settings(&self) -> &DavSettings {
        &self.settings
    }

    /// Dispatch a request and translate the outcome into a response.
    pub async fn handle(&self, request: &DavRequest) -> DavResponse {
        let result = match request.method.as_str() {
            "COPY" => self.handle_copy(request).await,
            "MOVE" => self.handle_move(request).await,
            "MKCOL" => self.handle_mkcol(request).await,
            "DELETE" => self.handle_delete(request).await,
            "PROPFIND" => self.handle_propfind(request).await,
            other => Err(DavError::MethodNotAllowed(other.to_string())),
        };
        match result {
            Ok(response) => response,
            Err(e) => {
                let response = DavResponse::from_error(&e);
                if response.status.is_server_error() {
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        error = %e,
                        "request failed"
                    );
                } else {
                    debug!(
                        method = %request.method,
                        path = %request.path,
                        error = %e,
                        "request rejected"
                    );
                }
                response
            }
        }
    }

    /// Load the backend configuration behind a resolved path.
    pub(crate) async fn target(&self, resolved: ResolvedPath) -> DavResult<Target> {
        let id = &resolved.mount.backend_id;
        let Some(config) = self.metadata.backend_config(id).await else {
            return Err(DavError::not_found(format!("no backend configuration {id}")));
        };
        let key = config.object_key(&resolved.sub_path, resolved.is_directory);
        Ok(Target {
            resolved,
            config,
            key,
        })
    }

    /// Post-mutation bookkeeping: ancestor timestamps for every mutated key,
    /// one invalidation per changed subtree, and the mount's last-used mark.
    pub(crate) async fn finish_mutation(
        &self,
        target: &Target,
        mutated: &[(&str, bool)],
    ) -> DavResult<()> {
        let keys: Vec<&str> = mutated.iter().map(|(key, _)| *key).collect();
        self.propagator.propagate_all(&target.config, &keys).await;
        let mount_id = &target.resolved.mount.id;
        for (key, is_directory) in mutated {
            self.cache
                .invalidate(key, &target.config, *is_directory, mount_id)
                .await;
        }
        self.metadata.touch_mount(mount_id).await;
        Ok(())
    }

    /// Invalidate after a multi-object failure; completed objects stay in
    /// place, so cached listings are stale regardless.
    pub(crate) async fn invalidate_partial(&self, target: &Target, mutated: &[(&str, bool)]) {
        let mount_id = &target.resolved.mount.id;
        for (key, is_directory) in mutated {
            self.cache
                .invalidate(key, &target.config, *is_directory, mount_id)
                .await;
        }
    }

    /// Key and directory-ness of the resource a target names, if it exists.
    ///
    /// A path without a trailing separator that names a directory resolves
    /// to the directory. Mount roots always exist.
    pub(crate) async fn existing_resource(
        &self,
        target: &Target,
    ) -> DavResult<Option<(String, bool)>> {
        if target.resolved.is_mount_root() {
            return Ok(Some((target.key.clone(), true)));
        }
        let dirs = self.directories(&target.config);
        if target.is_directory() {
            let presence = dirs.presence(&target.key).await?;
            return Ok(presence.exists().then(|| (target.key.clone(), true)));
        }
        let bucket = &target.config.bucket;
        if self.store.object_exists(bucket, &target.key).await? {
            return Ok(Some((target.key.clone(), false)));
        }
        let dir_key = format!("{}/", target.key);
        let presence = dirs.presence(&dir_key).await?;
        Ok(presence.exists().then_some((dir_key, true)))
    }

    pub(crate) fn directories<'a>(&'a self, config: &'a BackendConfig) -> DirectoryEmulator<'a> {
        DirectoryEmulator::new(
            self.store.as_ref(),
            &config.bucket,
            self.settings.list_page_size,
        )
    }

    pub(crate) fn engine<'a>(&'a self, config: &'a BackendConfig) -> TransferEngine<'a> {
        TransferEngine::new(
            self.store.as_ref(),
            config,
            self.settings.list_page_size,
            self.settings.transfer_concurrency,
        )
    }
}
