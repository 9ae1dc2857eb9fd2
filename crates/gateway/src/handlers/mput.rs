//! One file of a multi-file upload.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::put::put_file;
use super::{Operation, OutboundHandler, TransferRequest};
use crate::error::GatewayError;
use crate::gateway::GatewaySettings;
use crate::remote::RemoteClient;

/// Uploads a single matched file on behalf of a batch.
///
/// Pattern expansion happens in the gateway before any session is
/// borrowed; each matched file then goes through this handler as its own
/// request, so one failure does not affect the others.
pub struct MultiPutHandler {
    settings: Arc<GatewaySettings>,
}

impl MultiPutHandler {
    pub fn new(settings: Arc<GatewaySettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl OutboundHandler for MultiPutHandler {
    type Output = String;

    fn operation(&self) -> Operation {
        Operation::MultiPut
    }

    async fn handle(
        &self,
        client: &mut dyn RemoteClient,
        request: &TransferRequest,
    ) -> Result<Self::Output, GatewayError> {
        let remote = put_file(&self.settings, client, request).await?;
        debug!(request_id = %request.id, local = %request.path, remote = %remote, "Batch file uploaded");
        Ok(remote)
    }
}
