//! DELETE: remove a file, a directory marker, or a whole subtree.

use http::StatusCode;
use tracing::info;

use super::headers::Depth;
use super::{Dav, DavRequest, DavResponse};
use crate::error::{DavError, DavResult};
use crate::principal::Capability;
use crate::vfs::TransferDepth;

impl Dav {
    #[tracing::instrument(skip(self, request), name = "dav.delete", fields(path = %request.path))]
    pub(crate) async fn handle_delete(&self, request: &DavRequest) -> DavResult<DavResponse> {
        let resolved = self
            .mounts
            .resolve_mounted(&request.path, &request.principal, Capability::Operate)
            .await?;
        if resolved.is_mount_root() {
            return Err(DavError::forbidden("a mount root cannot be deleted"));
        }
        let depth = match Depth::from_headers(&request.headers)? {
            None | Some(Depth::Infinity) => TransferDepth::Recursive,
            Some(Depth::Zero) => TransferDepth::SelfOnly,
            Some(Depth::One) => {
                return Err(DavError::bad_request("Depth: 1 is not valid for delete"));
            }
        };

        let target = self.target(resolved).await?;
        let path = &target.resolved.virtual_path;
        let (key, is_directory) = self
            .existing_resource(&target)
            .await?
            .ok_or_else(|| DavError::not_found(format!("{path} does not exist")))?;

        let objects = if is_directory {
            let engine = self.engine(&target.config);
            match engine.remove_directory(&key, depth).await {
                Ok(report) => report.objects,
                Err(e) => {
                    if matches!(e, DavError::PartialFailure { .. }) {
                        let touched = [(key.as_str(), true)];
                        self.invalidate_partial(&target, &touched).await;
                    }
                    return Err(e);
                }
            }
        } else {
            self.store.delete_object(&target.config.bucket, &key).await?;
            1
        };

        let touched = [(key.as_str(), is_directory)];
        self.finish_mutation(&target, &touched).await?;
        info!(mount = %target.resolved.mount.id, key = %key, objects, "deleted");
        Ok(DavResponse::empty(StatusCode::NO_CONTENT))
    }
}
