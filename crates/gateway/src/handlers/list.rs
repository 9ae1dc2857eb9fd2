//! Directory listing.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Operation, OutboundHandler, TransferRequest};
use crate::error::GatewayError;
use crate::files::paths;
use crate::gateway::GatewaySettings;
use crate::remote::{RemoteClient, RemoteFileEntry};

/// Lists a remote directory. An empty path lists the remote root.
pub struct ListHandler {
    settings: Arc<GatewaySettings>,
}

impl ListHandler {
    pub fn new(settings: Arc<GatewaySettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl OutboundHandler for ListHandler {
    type Output = Vec<RemoteFileEntry>;

    fn operation(&self) -> Operation {
        Operation::List
    }

    async fn handle(
        &self,
        client: &mut dyn RemoteClient,
        request: &TransferRequest,
    ) -> Result<Self::Output, GatewayError> {
        let directory = paths::resolve_remote(&self.settings.remote_root, &request.path)?;

        let entries = client
            .list(&directory)
            .await
            .map_err(|source| GatewayError::RemoteList {
                directory: directory.clone(),
                source,
            })?;

        debug!(
            request_id = %request.id,
            directory = %directory,
            entries = entries.len(),
            "Listed remote directory"
        );
        Ok(entries)
    }
}
