//! Single-file download.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ensure_local_dir, Operation, OutboundHandler, TransferRequest};
use crate::error::GatewayError;
use crate::files::paths;
use crate::gateway::GatewaySettings;
use crate::remote::RemoteClient;

/// Downloads one remote file into the local root, replacing any existing
/// local file of the same name.
pub struct GetHandler {
    settings: Arc<GatewaySettings>,
}

impl GetHandler {
    pub fn new(settings: Arc<GatewaySettings>) -> Self {
        Self { settings }
    }
}

/// Local file name for a remote path, or `None` if it has no usable name.
pub(crate) fn local_name(remote: &str) -> Option<&str> {
    match paths::remote_basename(remote) {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// Partial download, removed when dropped unless it was moved into place.
///
/// Covers every early exit, including a round-trip deadline dropping the
/// transfer mid-download.
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Download `remote` to `local_dir/name` via a hidden partial file, so the
/// target is either the old file or the complete new one.
///
/// The partial name carries the request id; concurrent downloads of the
/// same file never share one.
pub(crate) async fn download_replacing(
    client: &mut dyn RemoteClient,
    remote: &str,
    local_dir: &Path,
    name: &str,
    request_id: Uuid,
) -> Result<PathBuf, GatewayError> {
    let target = local_dir.join(name);
    let mut partial = PartialFile::new(local_dir.join(format!(".{name}.{request_id}.part")));

    let bytes = client
        .download(remote, &partial.path)
        .await
        .map_err(|source| GatewayError::RemoteGet {
            path: remote.to_string(),
            source,
        })?;

    match tokio::fs::metadata(&partial.path).await {
        Ok(meta) if meta.is_file() => {}
        _ => {
            warn!(remote, local = %target.display(), "Download reported success but wrote nothing");
            return Err(GatewayError::TransferVerification(target));
        }
    }

    tokio::fs::rename(&partial.path, &target)
        .await
        .map_err(|source| GatewayError::LocalIo {
            path: target.clone(),
            source,
        })?;
    partial.committed = true;

    debug!(remote, local = %target.display(), bytes, "Downloaded file");
    Ok(target)
}

#[async_trait]
impl OutboundHandler for GetHandler {
    type Output = PathBuf;

    fn operation(&self) -> Operation {
        Operation::Get
    }

    async fn handle(
        &self,
        client: &mut dyn RemoteClient,
        request: &TransferRequest,
    ) -> Result<Self::Output, GatewayError> {
        let path = request.path.trim();
        if path.is_empty() || path.ends_with('/') {
            return Err(GatewayError::InvalidArgument("remote_file_path"));
        }
        let remote = paths::resolve_remote(&self.settings.remote_root, path)?;
        let name = local_name(&remote).ok_or(GatewayError::InvalidArgument("remote_file_path"))?;

        ensure_local_dir(&self.settings.local_root, self.settings.create_local_dirs).await?;
        let local_root = &self.settings.local_root;
        let local = download_replacing(client, &remote, local_root, name, request.id).await?;

        info!(request_id = %request.id, remote = %remote, local = %local.display(), "Get completed");
        Ok(local)
    }
}
