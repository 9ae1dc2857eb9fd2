//! Error types for the gateway.
//!
//! Each layer has its own error enum: [`ConnectError`] for establishing a
//! session, [`RemoteError`] for one protocol call on an open session and
//! [`GatewayError`] for what callers of the gateway actually see.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use protocol::{ErrorCode, ErrorMessage};
use thiserror::Error;

/// Errors raised while opening an authenticated session.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// TCP connection to the host failed.
    #[error("{target} is unreachable: {reason}")]
    Unreachable { target: String, reason: String },

    /// The server rejected the credential.
    #[error("authentication failed for {user}@{host}")]
    Authentication { user: String, host: String },

    /// The server's host key could not be verified.
    #[error("host key verification failed for {host}:{port}: {reason}")]
    HostKey {
        host: String,
        port: u16,
        reason: String,
    },

    /// The private key could not be loaded.
    #[error("failed to load private key {path}: {reason}")]
    Key { path: PathBuf, reason: String },

    /// The SSH handshake failed after the TCP connection was made.
    #[error("ssh handshake failed: {0}")]
    Handshake(String),

    /// The SFTP subsystem could not be started.
    #[error("sftp subsystem unavailable: {0}")]
    Subsystem(String),

    /// The session was not established within the connect deadline.
    #[error("connection not established within {0:?}")]
    TimedOut(Duration),

    /// The pool has been shut down.
    #[error("session pool is shut down")]
    PoolClosed,
}

impl ConnectError {
    /// Whether retrying the connection may succeed without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectError::Unreachable { .. }
                | ConnectError::Handshake(_)
                | ConnectError::Subsystem(_)
                | ConnectError::TimedOut(_)
        )
    }
}

/// Errors raised by a single call on an open session.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote path does not exist.
    #[error("no such file: {0}")]
    NotFound(String),

    /// The server refused access to the remote path.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The server reported a failure for the call.
    #[error("remote failure: {0}")]
    Failure(String),

    /// The session is no longer usable.
    #[error("session disconnected: {0}")]
    Disconnected(String),

    /// Local side of a transfer failed.
    #[error("local i/o error: {0}")]
    Io(#[from] io::Error),
}

impl RemoteError {
    /// Whether the session that produced this error must be discarded
    /// instead of being returned to the pool.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RemoteError::Disconnected(_))
    }
}

/// Errors returned by the transfer gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No session could be established.
    #[error("connection failed: {0}")]
    Connection(#[from] ConnectError),

    /// No reply within the round-trip deadline.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// Listing a remote directory failed.
    #[error("failed to list remote directory {directory}: {source}")]
    RemoteList {
        directory: String,
        #[source]
        source: RemoteError,
    },

    /// Downloading a remote file failed.
    #[error("failed to download {path}: {source}")]
    RemoteGet {
        path: String,
        #[source]
        source: RemoteError,
    },

    /// Uploading to the remote side failed.
    #[error("failed to upload to {path}: {source}")]
    RemotePut {
        path: String,
        #[source]
        source: RemoteError,
    },

    /// The local source file does not exist.
    #[error("local file not found: {}", .0.display())]
    LocalFileNotFound(PathBuf),

    /// A pattern matched no files.
    #[error("no files match pattern: {0}")]
    NoMatch(String),

    /// A transfer reported success but the expected file is absent.
    #[error("transfer reported success but {} is missing", .0.display())]
    TransferVerification(PathBuf),

    /// A required argument was empty.
    #[error("{0} must not be empty")]
    InvalidArgument(&'static str),

    /// A path would resolve outside the configured root.
    #[error("path escapes the configured root: {0}")]
    PathEscapesRoot(String),

    /// A local directory needed by the operation does not exist.
    #[error("local directory does not exist: {}", .0.display())]
    LocalDirectoryMissing(PathBuf),

    /// Local filesystem failure outside a transfer.
    #[error("local i/o error on {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Whether the failure is a caller-side precondition rather than a
    /// remote round-trip failure. Retrying the same request cannot help.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            GatewayError::LocalFileNotFound(_)
                | GatewayError::NoMatch(_)
                | GatewayError::InvalidArgument(_)
                | GatewayError::PathEscapesRoot(_)
                | GatewayError::LocalDirectoryMissing(_)
        )
    }

    /// Whether the session that produced this error must be discarded.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            GatewayError::RemoteList { source, .. }
            | GatewayError::RemoteGet { source, .. }
            | GatewayError::RemotePut { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// The path, pattern or directory the error is about.
    pub fn context(&self) -> Option<String> {
        match self {
            GatewayError::RemoteList { directory, .. } => Some(directory.clone()),
            GatewayError::RemoteGet { path, .. } | GatewayError::RemotePut { path, .. } => {
                Some(path.clone())
            }
            GatewayError::LocalFileNotFound(path)
            | GatewayError::TransferVerification(path)
            | GatewayError::LocalDirectoryMissing(path)
            | GatewayError::LocalIo { path, .. } => Some(path.display().to_string()),
            GatewayError::NoMatch(pattern) | GatewayError::PathEscapesRoot(pattern) => {
                Some(pattern.clone())
            }
            GatewayError::Connection(_)
            | GatewayError::Timeout(_)
            | GatewayError::InvalidArgument(_) => None,
        }
    }

    /// Convert this error to a protocol ErrorMessage.
    pub fn to_error_message(&self) -> ErrorMessage {
        let (code, recoverable) = match self {
            GatewayError::Connection(e) => (ErrorCode::ConnectionFailed, e.is_transient()),
            GatewayError::Timeout(_) => (ErrorCode::Timeout, true),
            GatewayError::RemoteList { .. } => (ErrorCode::RemoteListFailed, true),
            GatewayError::RemoteGet { .. } => (ErrorCode::RemoteGetFailed, true),
            GatewayError::RemotePut { .. } => (ErrorCode::RemotePutFailed, true),
            GatewayError::LocalFileNotFound(_) => (ErrorCode::LocalFileNotFound, false),
            GatewayError::NoMatch(_) => (ErrorCode::NoMatch, false),
            GatewayError::TransferVerification(_) => (ErrorCode::VerificationFailed, true),
            GatewayError::InvalidArgument(_) => (ErrorCode::InvalidRequest, false),
            GatewayError::PathEscapesRoot(_) => (ErrorCode::InvalidRequest, false),
            GatewayError::LocalDirectoryMissing(_) => (ErrorCode::InternalError, false),
            GatewayError::LocalIo { .. } => (ErrorCode::InternalError, true),
        };

        ErrorMessage {
            code,
            message: self.to_string(),
            context: self.context(),
            recoverable,
        }
    }
}
