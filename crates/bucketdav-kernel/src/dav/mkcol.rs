//! MKCOL: create one directory marker.

use http::StatusCode;
use tracing::info;

use super::{Dav, DavRequest, DavResponse};
use crate::error::{DavError, DavResult};
use crate::principal::Capability;
use crate::vfs::{DirectoryPresence, path};

impl Dav {
    #[tracing::instrument(skip(self, request), name = "dav.mkcol", fields(path = %request.path))]
    pub(crate) async fn handle_mkcol(&self, request: &DavRequest) -> DavResult<DavResponse> {
        let mut resolved = self
            .mounts
            .resolve_mounted(&request.path, &request.principal, Capability::Operate)
            .await?;
        if resolved.is_mount_root() {
            return Err(DavError::conflict(format!("{} already exists", resolved.mount.path)));
        }
        resolved.is_directory = true;

        let target = self.target(resolved).await?;
        let config = &target.config;
        let dirs = self.directories(config);

        if dirs.presence(&target.key).await? != DirectoryPresence::Absent {
            return Err(DavError::conflict(format!(
                "{} already exists",
                target.resolved.virtual_path
            )));
        }
        let file_key = target.key.trim_end_matches(path::SEPARATOR);
        if self.store.object_exists(&config.bucket, file_key).await? {
            return Err(DavError::conflict(format!(
                "a file named {} already exists",
                path::file_name(file_key)
            )));
        }

        let root_key = config.root_key();
        if let Some(parent) = path::parent_key(&target.key) {
            if parent.len() > root_key.len() && !dirs.presence(&parent).await?.exists() {
                return Err(DavError::conflict("parent directory does not exist"));
            }
        }

        dirs.put_marker(&target.key).await?;
        let touched = [(target.key.as_str(), true)];
        self.finish_mutation(&target, &touched).await?;
        info!(mount = %target.resolved.mount.id, key = %target.key, "directory created");
        Ok(DavResponse::empty(StatusCode::CREATED))
    }
}
