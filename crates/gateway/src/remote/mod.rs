//! Remote file-transfer capability.
//!
//! The gateway never speaks the wire protocol itself. It depends on the
//! [`RemoteClient`] trait for file operations on one open session and on
//! [`Connector`] for opening new sessions. [`ssh`] provides the SFTP-over-SSH
//! implementation used in production.

pub mod ssh;
#[cfg(test)]
pub mod testing;

use std::path::Path;

use async_trait::async_trait;
use protocol::{FileInfo, FileType};

use crate::error::{ConnectError, RemoteError};
use crate::session::RemoteEndpoint;

pub use ssh::{SftpClient, SshConnector};

/// Kind of a remote directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Metadata of a single remote directory entry.
///
/// This is a snapshot of the server's metadata at the time of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileEntry {
    /// Entry name, without the directory part.
    pub name: String,
    /// Entry kind. Anything that is not a directory is a file.
    pub kind: EntryKind,
    /// Size in bytes.
    pub size: u64,
    /// Modification time, Unix epoch seconds.
    pub modified_secs: u64,
}

impl RemoteFileEntry {
    /// Whether the entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Convert to the protocol listing entry.
    pub fn to_protocol(&self) -> FileInfo {
        FileInfo {
            filename: self.name.clone(),
            filetype: match self.kind {
                EntryKind::File => FileType::File,
                EntryKind::Directory => FileType::Directory,
            },
            size: i64::try_from(self.size).unwrap_or(i64::MAX),
            last_modified_millis: i64::try_from(self.modified_secs)
                .unwrap_or(i64::MAX / 1000)
                .saturating_mul(1000),
        }
    }
}

/// File operations on one open, authenticated session.
///
/// Methods take `&mut self`: a session serves one operation at a time.
#[async_trait]
pub trait RemoteClient: Send {
    /// List the entries of a remote directory, excluding `.` and `..`.
    async fn list(&mut self, dir: &str) -> Result<Vec<RemoteFileEntry>, RemoteError>;

    /// Metadata of a remote path, or `None` if it does not exist.
    async fn stat(&mut self, path: &str) -> Result<Option<RemoteFileEntry>, RemoteError>;

    /// Copy a remote file into a local file, creating or truncating it.
    /// Returns the number of bytes written.
    async fn download(&mut self, remote: &str, local: &Path) -> Result<u64, RemoteError>;

    /// Copy a local file to a remote path, creating or truncating it.
    /// Returns the number of bytes written.
    async fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, RemoteError>;

    /// Create a remote directory and any missing parents.
    async fn create_dir_all(&mut self, dir: &str) -> Result<(), RemoteError>;

    /// Remove a remote file.
    async fn remove_file(&mut self, path: &str) -> Result<(), RemoteError>;

    /// Rename a remote file. The target must not exist.
    async fn rename(&mut self, from: &str, to: &str) -> Result<(), RemoteError>;

    /// Whether the underlying connection has gone away.
    fn is_closed(&self) -> bool;

    /// Close the session.
    async fn close(&mut self) -> Result<(), RemoteError>;
}

/// Opens authenticated sessions to a remote endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &RemoteEndpoint,
    ) -> Result<Box<dyn RemoteClient>, ConnectError>;
}
