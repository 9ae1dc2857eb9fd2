//! Single-file upload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Operation, OutboundHandler, TransferRequest};
use crate::error::{GatewayError, RemoteError};
use crate::files::paths;
use crate::gateway::GatewaySettings;
use crate::remote::RemoteClient;

/// Uploads one local file into a remote directory, replacing any existing
/// remote file of the same name. Missing remote directories are created
/// only when `create_remote_dirs` is set.
pub struct PutHandler {
    settings: Arc<GatewaySettings>,
}

impl PutHandler {
    pub fn new(settings: Arc<GatewaySettings>) -> Self {
        Self { settings }
    }

    /// Resolve and check the local source of a request.
    pub(crate) async fn local_source(
        settings: &GatewaySettings,
        request: &TransferRequest,
    ) -> Result<PathBuf, GatewayError> {
        if request.path.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("local_relative_path"));
        }
        let local = paths::resolve_local(&settings.local_root, &request.path)?;

        match tokio::fs::metadata(&local).await {
            Ok(meta) if meta.is_file() => Ok(local),
            _ => Err(GatewayError::LocalFileNotFound(local)),
        }
    }
}

/// Make sure the remote target directory exists.
async fn prepare_remote_dir(
    client: &mut dyn RemoteClient,
    dir: &str,
    create: bool,
    target: &str,
) -> Result<(), GatewayError> {
    let put_error = |source| GatewayError::RemotePut {
        path: target.to_string(),
        source,
    };

    match client.stat(dir).await.map_err(put_error)? {
        Some(entry) if entry.is_dir() => Ok(()),
        Some(_) => Err(put_error(RemoteError::Failure(format!(
            "{dir} is not a directory"
        )))),
        None if create => {
            debug!(dir, "Creating remote directory");
            client.create_dir_all(dir).await.map_err(put_error)
        }
        None => Err(put_error(RemoteError::NotFound(dir.to_string()))),
    }
}

/// Swaps attempted before a rename failure is reported.
const REPLACE_ATTEMPTS: usize = 3;

/// Move `temporary` onto `target`, removing any file already there.
///
/// SFTP renames refuse an existing target, and a concurrent upload may
/// recreate it between the remove and the rename; the swap is retried then.
async fn replace_remote(
    client: &mut dyn RemoteClient,
    temporary: &str,
    target: &str,
) -> Result<(), RemoteError> {
    let mut attempts = 0;
    loop {
        if client.stat(target).await?.is_some() {
            match client.remove_file(target).await {
                Ok(()) | Err(RemoteError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        let err = match client.rename(temporary, target).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        attempts += 1;
        if err.is_fatal()
            || attempts >= REPLACE_ATTEMPTS
            || client.stat(target).await?.is_none()
        {
            return Err(err);
        }
        debug!(remote = %target, error = %err, "Target reappeared during rename, retrying");
    }
}

/// Upload `local` as `remote_dir/name`.
///
/// The data goes to `<name>.<request id>.writing` first; the old target is
/// removed and the temporary file renamed over it once the upload is
/// complete.
pub(crate) async fn upload_replacing(
    client: &mut dyn RemoteClient,
    local: &Path,
    remote_dir: &str,
    name: &str,
    request_id: Uuid,
) -> Result<String, GatewayError> {
    let target = paths::join_remote(remote_dir, name);
    let temporary = format!("{target}.{request_id}.writing");

    let result = async {
        let bytes = client.upload(local, &temporary).await?;
        replace_remote(client, &temporary, &target).await?;
        Ok::<u64, RemoteError>(bytes)
    }
    .await;

    match result {
        Ok(bytes) => {
            debug!(local = %local.display(), remote = %target, bytes, "Uploaded file");
            Ok(target)
        }
        Err(source) => {
            if !source.is_fatal() {
                if let Err(e) = client.remove_file(&temporary).await {
                    debug!(remote = %temporary, error = %e, "Could not remove temporary upload");
                }
            }
            warn!(local = %local.display(), remote = %target, error = %source, "Upload failed");
            Err(GatewayError::RemotePut {
                path: target,
                source,
            })
        }
    }
}

/// Upload the request's local file. Shared by single and batch uploads.
pub(crate) async fn put_file(
    settings: &GatewaySettings,
    client: &mut dyn RemoteClient,
    request: &TransferRequest,
) -> Result<String, GatewayError> {
    let remote_dir = request.require_target_dir()?;
    let local = PutHandler::local_source(settings, request).await?;
    let name = local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or(GatewayError::InvalidArgument("local_relative_path"))?;

    let remote_dir = paths::resolve_remote(&settings.remote_root, remote_dir)?;
    let target = paths::join_remote(&remote_dir, &name);
    prepare_remote_dir(client, &remote_dir, settings.create_remote_dirs, &target).await?;

    upload_replacing(client, &local, &remote_dir, &name, request.id).await
}

#[async_trait]
impl OutboundHandler for PutHandler {
    type Output = String;

    fn operation(&self) -> Operation {
        Operation::Put
    }

    async fn handle(
        &self,
        client: &mut dyn RemoteClient,
        request: &TransferRequest,
    ) -> Result<Self::Output, GatewayError> {
        let remote = put_file(&self.settings, client, request).await?;
        info!(request_id = %request.id, local = %request.path, remote = %remote, "Put completed");
        Ok(remote)
    }
}
