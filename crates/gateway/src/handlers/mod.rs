//! Outbound handlers, one per operation.
//!
//! A handler performs the remote round trip for one [`TransferRequest`] on a
//! session it is handed. It owns the directory-resolution rule and the
//! conflict policy of its operation. Every handler replaces existing
//! targets: data is first written to a temporary name and then moved over
//! the target, so retrying a failed batch never leaves duplicates behind.

pub mod get;
pub mod list;
pub mod mget;
pub mod mput;
pub mod put;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::remote::RemoteClient;

pub use get::GetHandler;
pub use list::ListHandler;
pub use mget::MultiGetHandler;
pub use mput::MultiPutHandler;
pub use put::PutHandler;

/// Kind of operation a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Put,
    MultiGet,
    MultiPut,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Put => "put",
            Operation::MultiGet => "mget",
            Operation::MultiPut => "mput",
        };
        f.write_str(name)
    }
}

/// One call into the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Id used to correlate log lines of one request.
    pub id: Uuid,
    /// Requested operation.
    pub operation: Operation,
    /// Path or pattern, as given by the caller.
    pub path: String,
    /// Target remote directory, for uploads.
    pub target_dir: Option<String>,
}

impl TransferRequest {
    pub fn new(operation: Operation, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            path: path.into(),
            target_dir: None,
        }
    }

    pub fn with_target_dir(mut self, dir: impl Into<String>) -> Self {
        self.target_dir = Some(dir.into());
        self
    }

    /// Target directory, or an error if the request has none.
    pub fn require_target_dir(&self) -> Result<&str, GatewayError> {
        match self.target_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => Ok(dir),
            _ => Err(GatewayError::InvalidArgument("remote_dir")),
        }
    }
}

/// Performs one operation on a borrowed session.
#[async_trait]
pub trait OutboundHandler: Send + Sync {
    /// What the handler returns on success.
    type Output: Send;

    /// The operation this handler serves.
    fn operation(&self) -> Operation;

    /// Run the round trip for `request` on `client`.
    async fn handle(
        &self,
        client: &mut dyn RemoteClient,
        request: &TransferRequest,
    ) -> Result<Self::Output, GatewayError>;
}

/// Make sure a local directory exists, creating it only if allowed.
pub(crate) async fn ensure_local_dir(dir: &Path, create: bool) -> Result<(), GatewayError> {
    if tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
        return Ok(());
    }
    if !create {
        return Err(GatewayError::LocalDirectoryMissing(dir.to_path_buf()));
    }

    tracing::debug!(dir = %dir.display(), "Creating local directory");
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| GatewayError::LocalIo {
            path: dir.to_path_buf(),
            source,
        })
}
