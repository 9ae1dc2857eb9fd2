//! Command surface of the SFTP gateway.
//!
//! These are the request and reply shapes exchanged between the gateway and
//! whatever request layer sits in front of it (HTTP adapter, CLI, job runner).
//! Everything is serialized as JSON with the field names external clients
//! already depend on (`filename`, `lastModifiedMillis`, `remotePaths`, ...).

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A command addressed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "camelCase")]
pub enum Command {
    /// List a remote directory. `None` or an empty string means the
    /// configured remote root.
    List(ListRequest),
    /// Download one remote file into the local root.
    Get(GetRequest),
    /// Upload one local file into a remote directory.
    Put(PutRequest),
    /// Download every remote file matching a pattern.
    MultiGet(MultiGetRequest),
    /// Upload every local file matching a pattern.
    MultiPut(MultiPutRequest),
}

impl Command {
    /// Parse a command from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the command to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Reply to a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", content = "body", rename_all = "camelCase")]
pub enum Reply {
    /// Directory listing.
    Listing(Vec<FileInfo>),
    /// Single download confirmation.
    Get(GetResponse),
    /// Single upload confirmation.
    Put(PutResponse),
    /// Multi-file download confirmation.
    MultiGet(MultiGetResponse),
    /// Multi-file upload report.
    MultiPut(MultiPutResponse),
    /// The command failed.
    Error(ErrorMessage),
}

impl Reply {
    /// Whether this reply carries an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Serialize the reply to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a reply from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Request to list a remote directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    /// Directory to list.
    #[serde(default)]
    pub directory: Option<String>,
}

/// Request to download a single remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRequest {
    /// Remote path of the file.
    pub remote_file_path: String,
}

/// Request to upload a single local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutRequest {
    /// Path relative to the configured local root.
    pub local_relative_path: String,
    /// Remote directory receiving the file.
    pub remote_dir: String,
}

/// Request to download all remote files matching a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiGetRequest {
    /// Glob pattern, relative to the remote root unless absolute.
    pub remote_pattern: String,
}

/// Request to upload all local files matching a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiPutRequest {
    /// Glob pattern, relative to the configured local root.
    pub local_pattern: String,
    /// Remote directory receiving the files.
    pub remote_dir: String,
}

// ============================================================================
// Replies
// ============================================================================

/// A single entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Entry name (not full path).
    pub filename: String,
    /// Entry type.
    pub filetype: FileType,
    /// Size in bytes.
    pub size: i64,
    /// Last modification time, Unix epoch milliseconds.
    pub last_modified_millis: i64,
}

/// Type of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Regular file (anything that is not a directory).
    File,
    /// Directory.
    Directory,
}

/// Confirmation of a single download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResponse {
    /// Absolute local path of the downloaded file.
    pub local_path: String,
}

/// Confirmation of a single upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutResponse {
    /// Remote path of the uploaded file.
    pub remote_path: String,
}

/// Confirmation of a multi-file download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiGetResponse {
    /// Absolute local paths of the downloaded files.
    pub local_paths: Vec<String>,
}

/// Report of a multi-file upload.
///
/// Every matched local file shows up exactly once, either in
/// `remote_paths` or in `failures`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiPutResponse {
    /// Remote paths of the files uploaded successfully.
    pub remote_paths: Vec<String>,
    /// Files that could not be uploaded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<TransferFailure>,
}

/// One failed file inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFailure {
    /// The local file that failed.
    pub local_path: String,
    /// Why it failed.
    pub error: ErrorMessage,
}

// ============================================================================
// Errors
// ============================================================================

/// Error reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Error code for programmatic handling.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Optional context (path, pattern, remote directory).
    pub context: Option<String>,
    /// Whether retrying the same command may succeed.
    pub recoverable: bool,
}

/// Error codes for gateway failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Session could not be established (unreachable, auth, host key).
    ConnectionFailed,
    /// No reply within the round-trip deadline.
    Timeout,
    /// Listing the remote side failed.
    RemoteListFailed,
    /// Downloading from the remote side failed.
    RemoteGetFailed,
    /// Uploading to the remote side failed.
    RemotePutFailed,
    /// The local source file does not exist.
    LocalFileNotFound,
    /// A pattern matched no files.
    NoMatch,
    /// A transfer reported success but its artifact is missing.
    VerificationFailed,
    /// Invalid request or parameters.
    InvalidRequest,
    /// Local filesystem or internal failure.
    InternalError,
}
