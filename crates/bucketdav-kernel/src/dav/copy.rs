//! COPY and MOVE.
//!
//! Both verbs share resolution, validation and existence checks; they differ
//! only in the per-object operation the transfer engine performs and in how
//! a failure partway through is handled (see
//! [`TransferEngine::execute`](crate::vfs::TransferEngine::execute)).

use http::StatusCode;
use tracing::{debug, info};

use super::headers::{self, Depth};
use super::{Dav, DavRequest, DavResponse};
use crate::error::{DavError, DavResult};
use crate::principal::Capability;
use crate::vfs::{Resolution, TransferDepth, TransferKind, path};

impl Dav {
    #[tracing::instrument(skip(self, request), name = "dav.copy", fields(path = %request.path))]
    pub(crate) async fn handle_copy(&self, request: &DavRequest) -> DavResult<DavResponse> {
        self.transfer(request, TransferKind::Copy).await
    }

    #[tracing::instrument(skip(self, request), name = "dav.move", fields(path = %request.path))]
    pub(crate) async fn handle_move(&self, request: &DavRequest) -> DavResult<DavResponse> {
        self.transfer(request, TransferKind::Move).await
    }

    async fn transfer(&self, request: &DavRequest, kind: TransferKind) -> DavResult<DavResponse> {
        let principal = &request.principal;

        let source = self
            .mounts
            .resolve_mounted(&request.path, principal, Capability::Operate)
            .await?;
        let dest_path =
            headers::destination(&request.headers, &request.path, &self.settings.base_path)?;

        if path::same_resource(&source.virtual_path, &dest_path) {
            return Err(DavError::bad_request("source and destination are the same"));
        }
        let dest = match self.mounts.locate(&dest_path).await? {
            Resolution::Root => {
                return Err(DavError::forbidden("the virtual root cannot be a destination"));
            }
            Resolution::Mounted(dest) => dest,
        };
        if dest.mount.id != source.mount.id {
            return Err(DavError::UnsupportedCrossMount {
                source_mount: source.mount.path.clone(),
                dest_mount: dest.mount.path.clone(),
            });
        }
        if dest.is_mount_root() {
            return Err(DavError::forbidden("a mount root cannot be a destination"));
        }
        if kind == TransferKind::Move && source.is_mount_root() {
            return Err(DavError::forbidden("a mount root cannot be moved"));
        }

        let depth = match Depth::from_headers(&request.headers)? {
            None | Some(Depth::Infinity) => TransferDepth::Recursive,
            Some(Depth::Zero) => TransferDepth::SelfOnly,
            Some(Depth::One) => {
                return Err(DavError::bad_request(format!("Depth: 1 is not valid for {kind}")));
            }
        };
        let is_directory = source.is_directory;
        if kind == TransferKind::Move && is_directory && depth == TransferDepth::SelfOnly {
            return Err(DavError::bad_request("a collection is always moved with its members"));
        }
        let overwrite = headers::overwrite(&request.headers);

        let source = self.target(source).await?;
        let config = &source.config;
        let dest_key = config.object_key(&dest.sub_path, is_directory);
        if is_directory && dest_key.starts_with(&source.key) {
            return Err(DavError::bad_request("destination is inside the source"));
        }

        let dirs = self.directories(config);
        if let Some(parent) = path::parent_key(&dest_key) {
            let outcome = dirs.ensure_best_effort(&parent, &config.root_key()).await;
            debug!(parent = %parent, ?outcome, "destination parent");
        }

        let dest_exists = if is_directory {
            dirs.presence(&dest_key).await?.exists()
        } else {
            self.store.object_exists(&config.bucket, &dest_key).await?
        };
        if dest_exists && !overwrite {
            return Err(DavError::precondition_failed(format!(
                "{} exists and overwrite is disabled",
                dest.virtual_path
            )));
        }

        let engine = self.engine(config);
        let result = if is_directory {
            engine
                .transfer_directory(kind, &source.key, &dest_key, depth, overwrite)
                .await
        } else {
            engine.transfer_file(kind, &source.key, &dest_key).await
        };

        let mut mutated = vec![(dest_key.as_str(), is_directory)];
        if kind == TransferKind::Move {
            mutated.push((source.key.as_str(), is_directory));
        }
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                if matches!(e, DavError::PartialFailure { .. }) {
                    self.invalidate_partial(&source, &mutated).await;
                }
                return Err(e);
            }
        };

        self.finish_mutation(&source, &mutated).await?;
        info!(
            kind = %kind,
            mount = %source.resolved.mount.id,
            source = %source.key,
            dest = %dest_key,
            objects = report.objects,
            "transfer succeeded"
        );
        Ok(DavResponse::empty(StatusCode::CREATED))
    }
}
