//! Multi-file download by remote pattern.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::get::download_replacing;
use super::{ensure_local_dir, Operation, OutboundHandler, TransferRequest};
use crate::error::GatewayError;
use crate::files::paths;
use crate::gateway::GatewaySettings;
use crate::remote::RemoteClient;

/// Downloads every remote file whose name matches a glob.
///
/// The pattern's directory part is resolved against the remote root and
/// listed; the file-name part is matched on the remote listing. Matching
/// directories are skipped. The first failed download aborts the batch.
pub struct MultiGetHandler {
    settings: Arc<GatewaySettings>,
}

impl MultiGetHandler {
    pub fn new(settings: Arc<GatewaySettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl OutboundHandler for MultiGetHandler {
    type Output = Vec<PathBuf>;

    fn operation(&self) -> Operation {
        Operation::MultiGet
    }

    async fn handle(
        &self,
        client: &mut dyn RemoteClient,
        request: &TransferRequest,
    ) -> Result<Self::Output, GatewayError> {
        let pattern = request.path.trim();
        let (dir, glob) = paths::split_remote_pattern(pattern);
        if glob.is_empty() {
            return Err(GatewayError::InvalidArgument("remote_pattern"));
        }
        let dir = paths::resolve_remote(&self.settings.remote_root, dir)?;

        let entries = client
            .list(&dir)
            .await
            .map_err(|source| GatewayError::RemoteList {
                directory: dir.clone(),
                source,
            })?;

        let matched: Vec<String> = entries
            .into_iter()
            .filter(|entry| !entry.is_dir() && glob_match::glob_match(glob, &entry.name))
            .map(|entry| entry.name)
            .collect();
        if matched.is_empty() {
            return Err(GatewayError::NoMatch(pattern.to_string()));
        }

        ensure_local_dir(&self.settings.local_root, self.settings.create_local_dirs).await?;

        let mut local_paths = Vec::with_capacity(matched.len());
        for name in &matched {
            let remote = paths::join_remote(&dir, name);
            let local =
                download_replacing(client, &remote, &self.settings.local_root, name, request.id)
                    .await?;
            local_paths.push(local);
        }

        info!(
            request_id = %request.id,
            pattern,
            directory = %dir,
            matched = local_paths.len(),
            "MultiGet completed"
        );
        Ok(local_paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::remote::testing::{memory_client as client, MemoryFs};
    use std::path::Path;
    use tempfile::TempDir;

    fn handler(local_root: &Path) -> MultiGetHandler {
        MultiGetHandler::new(Arc::new(GatewaySettings::new(local_root, "/upload")))
    }

    fn remote_tree() -> MemoryFs {
        let fs = MemoryFs::new();
        fs.add_file("/upload/jan.csv", b"jan");
        fs.add_file("/upload/feb.csv", b"feb");
        fs.add_file("/upload/notes.txt", b"notes");
        fs.add_dir("/upload/old.csv");
        fs
    }

    #[tokio::test]
    async fn test_mget_relative_pattern() {
        let temp = TempDir::new().unwrap();
        let fs = remote_tree();
        let mut client = client(&fs).await;

        let request = TransferRequest::new(Operation::MultiGet, "*.csv");
        let mut local = handler(temp.path())
            .handle(client.as_mut(), &request)
            .await
            .unwrap();
        local.sort();

        assert_eq!(
            local,
            vec![temp.path().join("feb.csv"), temp.path().join("jan.csv")]
        );
        assert_eq!(std::fs::read(temp.path().join("jan.csv")).unwrap(), b"jan");
        assert!(!temp.path().join("old.csv").exists());
    }

    #[tokio::test]
    async fn test_mget_absolute_pattern() {
        let temp = TempDir::new().unwrap();
        let fs = MemoryFs::new();
        fs.add_file("/outbox/a.txt", b"a");
        let mut client = client(&fs).await;

        let request = TransferRequest::new(Operation::MultiGet, "/outbox/?.txt");
        let local = handler(temp.path())
            .handle(client.as_mut(), &request)
            .await
            .unwrap();
        assert_eq!(local, vec![temp.path().join("a.txt")]);
    }

    #[tokio::test]
    async fn test_mget_no_match() {
        let temp = TempDir::new().unwrap();
        let fs = remote_tree();
        let mut client = client(&fs).await;

        let request = TransferRequest::new(Operation::MultiGet, "*.xml");
        let result = handler(temp.path()).handle(client.as_mut(), &request).await;
        assert!(matches!(result, Err(GatewayError::NoMatch(p)) if p == "*.xml"));
    }

    #[tokio::test]
    async fn test_mget_missing_directory() {
        let temp = TempDir::new().unwrap();
        let fs = MemoryFs::new();
        let mut client = client(&fs).await;

        let request = TransferRequest::new(Operation::MultiGet, "/missing/*.csv");
        let result = handler(temp.path()).handle(client.as_mut(), &request).await;
        assert!(matches!(result, Err(GatewayError::RemoteList { .. })));
    }

    #[tokio::test]
    async fn test_mget_stops_at_first_failure() {
        let temp = TempDir::new().unwrap();
        let fs = MemoryFs::new();
        fs.add_file("/upload/a.csv", b"a");
        fs.add_file("/upload/b.csv", b"b");
        fs.fail_on("/upload/a.csv");
        let mut client = client(&fs).await;

        let request = TransferRequest::new(Operation::MultiGet, "*.csv");
        let result = handler(temp.path()).handle(client.as_mut(), &request).await;

        assert!(matches!(
            result,
            Err(GatewayError::RemoteGet { ref path, source: RemoteError::Failure(_) })
                if path == "/upload/a.csv"
        ));
        // Listing order is sorted in the in-memory tree, so b.csv was never fetched
        assert!(!temp.path().join("b.csv").exists());
    }

    #[tokio::test]
    async fn test_mget_rejects_directory_pattern() {
        let temp = TempDir::new().unwrap();
        let fs = remote_tree();
        let mut client = client(&fs).await;

        let request = TransferRequest::new(Operation::MultiGet, "/upload/");
        let result = handler(temp.path()).handle(client.as_mut(), &request).await;
        assert!(matches!(result, Err(GatewayError::InvalidArgument(_))));
    }
}
