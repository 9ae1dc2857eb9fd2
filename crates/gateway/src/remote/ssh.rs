//! SFTP over SSH, backed by `russh` and `russh-sftp`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{AuthResult, Config, Handle};
use russh::keys::ssh_key::PublicKey;
use russh::keys::known_hosts::{learn_known_hosts, learn_known_hosts_path};
use russh::keys::{HashAlg, PrivateKeyWithHashAlg};
use russh::Disconnect;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::StatusCode;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{Connector, EntryKind, RemoteClient, RemoteFileEntry};
use crate::error::{ConnectError, RemoteError};
use crate::files::paths;
use crate::session::{Credential, HostKeyPolicy, RemoteEndpoint};

/// Errors surfaced from the russh client handler.
#[derive(Debug, thiserror::Error)]
enum HandlerError {
    #[error(transparent)]
    Ssh(#[from] russh::Error),

    #[error("{0}")]
    HostKey(String),
}

/// russh client handler that applies the configured host-key policy.
struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
    known_hosts: Option<PathBuf>,
}

impl ClientHandler {
    fn new(endpoint: &RemoteEndpoint) -> Self {
        Self {
            host: endpoint.host.clone(),
            port: endpoint.port,
            policy: endpoint.host_key_policy,
            known_hosts: endpoint.known_hosts.clone(),
        }
    }

    fn check_known_hosts(&self, key: &PublicKey) -> Result<bool, russh::keys::Error> {
        match &self.known_hosts {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        }
    }

    fn learn_known_hosts(&self, key: &PublicKey) -> Result<(), russh::keys::Error> {
        match &self.known_hosts {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        }
    }

    fn verify(&self, key: &PublicKey) -> Result<bool, HandlerError> {
        let fingerprint = key.fingerprint(HashAlg::Sha256);

        if self.policy == HostKeyPolicy::AcceptAny {
            warn!(
                host = %self.host,
                port = self.port,
                %fingerprint,
                "Accepting host key without verification"
            );
            return Ok(true);
        }

        match self.check_known_hosts(key) {
            Ok(true) => Ok(true),
            Ok(false) if self.policy == HostKeyPolicy::AcceptNew => {
                info!(
                    host = %self.host,
                    port = self.port,
                    %fingerprint,
                    "Learning unknown host key"
                );
                self.learn_known_hosts(key)
                    .map_err(|e| HandlerError::HostKey(format!("failed to learn host key: {e}")))?;
                Ok(true)
            }
            Ok(false) => Err(HandlerError::HostKey(format!(
                "key {fingerprint} is not present in known_hosts"
            ))),
            // Changed keys are rejected under every verifying policy
            Err(e) => Err(HandlerError::HostKey(e.to_string())),
        }
    }
}

impl russh::client::Handler for ClientHandler {
    type Error = HandlerError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        self.verify(server_public_key)
    }
}

/// Opens SFTP sessions over SSH.
pub struct SshConnector {
    config: Arc<Config>,
}

impl SshConnector {
    /// Create a connector with default SSH client settings.
    pub fn new() -> Self {
        Self {
            config: Arc::new(Config::default()),
        }
    }

    async fn authenticate(
        handle: &mut Handle<ClientHandler>,
        endpoint: &RemoteEndpoint,
    ) -> Result<(), ConnectError> {
        let result = match &endpoint.credential {
            Credential::Password(password) => handle
                .authenticate_password(endpoint.user.clone(), password.clone())
                .await
                .map_err(|e| ConnectError::Handshake(e.to_string()))?,
            Credential::PrivateKey { path, passphrase } => {
                let key = russh::keys::load_secret_key(path, passphrase.as_deref()).map_err(
                    |e| ConnectError::Key {
                        path: path.clone(),
                        reason: e.to_string(),
                    },
                )?;
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(|e| ConnectError::Handshake(e.to_string()))?
                    .flatten();
                handle
                    .authenticate_publickey(
                        endpoint.user.clone(),
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(|e| ConnectError::Handshake(e.to_string()))?
            }
        };

        match result {
            AuthResult::Success => Ok(()),
            AuthResult::Failure { .. } => Err(ConnectError::Authentication {
                user: endpoint.user.clone(),
                host: endpoint.host.clone(),
            }),
        }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        endpoint: &RemoteEndpoint,
    ) -> Result<Box<dyn RemoteClient>, ConnectError> {
        let target = format!("{}:{}", endpoint.host, endpoint.port);
        let handler = ClientHandler::new(endpoint);

        let mut handle = russh::client::connect(
            self.config.clone(),
            (endpoint.host.as_str(), endpoint.port),
            handler,
        )
        .await
        .map_err(|e| match e {
            HandlerError::HostKey(reason) => ConnectError::HostKey {
                host: endpoint.host.clone(),
                port: endpoint.port,
                reason,
            },
            HandlerError::Ssh(russh::Error::IO(e)) => ConnectError::Unreachable {
                target: target.clone(),
                reason: e.to_string(),
            },
            HandlerError::Ssh(e) => ConnectError::Handshake(e.to_string()),
        })?;

        debug!(
            target = %endpoint.display_target(),
            method = endpoint.credential.method(),
            "SSH transport established, authenticating"
        );
        Self::authenticate(&mut handle, endpoint).await?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| ConnectError::Subsystem(e.to_string()))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| ConnectError::Subsystem(e.to_string()))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| ConnectError::Subsystem(e.to_string()))?;

        info!(target = %endpoint.display_target(), "SFTP session opened");
        Ok(Box::new(SftpClient { handle, sftp }))
    }
}

/// An open SFTP session.
pub struct SftpClient {
    handle: Handle<ClientHandler>,
    sftp: SftpSession,
}

/// Classify an SFTP error for the given remote path.
fn remote_error(path: &str, err: SftpError) -> RemoteError {
    match err {
        SftpError::Status(status) => match status.status_code {
            StatusCode::NoSuchFile => RemoteError::NotFound(path.to_string()),
            StatusCode::PermissionDenied => RemoteError::PermissionDenied(path.to_string()),
            StatusCode::NoConnection | StatusCode::ConnectionLost => {
                RemoteError::Disconnected(status.error_message)
            }
            _ => RemoteError::Failure(format!("{}: {}", path, status.error_message)),
        },
        SftpError::IO(reason) => RemoteError::Disconnected(reason),
        SftpError::Timeout => RemoteError::Disconnected(format!("{path}: request timed out")),
        other => RemoteError::Failure(format!("{path}: {other}")),
    }
}

fn to_entry(name: String, attrs: &russh_sftp::protocol::FileAttributes) -> RemoteFileEntry {
    RemoteFileEntry {
        name,
        kind: if attrs.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        },
        size: attrs.size.unwrap_or(0),
        modified_secs: attrs.mtime.map(u64::from).unwrap_or(0),
    }
}

#[async_trait]
impl RemoteClient for SftpClient {
    async fn list(&mut self, dir: &str) -> Result<Vec<RemoteFileEntry>, RemoteError> {
        let entries = self
            .sftp
            .read_dir(dir)
            .await
            .map_err(|e| remote_error(dir, e))?;

        Ok(entries
            .filter(|entry| {
                let name = entry.file_name();
                name != "." && name != ".."
            })
            .map(|entry| to_entry(entry.file_name(), &entry.metadata()))
            .collect())
    }

    async fn stat(&mut self, path: &str) -> Result<Option<RemoteFileEntry>, RemoteError> {
        match self.sftp.metadata(path).await {
            Ok(attrs) => Ok(Some(to_entry(paths::remote_basename(path).to_string(), &attrs))),
            Err(e) => match remote_error(path, e) {
                RemoteError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<u64, RemoteError> {
        let mut source = self
            .sftp
            .open(remote)
            .await
            .map_err(|e| remote_error(remote, e))?;
        let mut target = tokio::fs::File::create(local).await?;

        let bytes = tokio::io::copy(&mut source, &mut target).await?;
        target.flush().await?;
        source.shutdown().await?;
        Ok(bytes)
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, RemoteError> {
        let mut source = tokio::fs::File::open(local).await?;
        let mut target = self
            .sftp
            .create(remote)
            .await
            .map_err(|e| remote_error(remote, e))?;

        let bytes = tokio::io::copy(&mut source, &mut target).await?;
        target.shutdown().await?;
        Ok(bytes)
    }

    async fn create_dir_all(&mut self, dir: &str) -> Result<(), RemoteError> {
        for current in paths::remote_ancestors(dir) {
            match self.sftp.metadata(&current).await {
                Ok(attrs) if attrs.is_dir() => continue,
                Ok(_) => {
                    return Err(RemoteError::Failure(format!(
                        "{current} exists but is not a directory"
                    )));
                }
                Err(e) => match remote_error(&current, e) {
                    RemoteError::NotFound(_) => {
                        debug!(dir = %current, "Creating remote directory");
                        self.sftp
                            .create_dir(&current)
                            .await
                            .map_err(|e| remote_error(&current, e))?;
                    }
                    other => return Err(other),
                },
            }
        }
        Ok(())
    }

    async fn remove_file(&mut self, path: &str) -> Result<(), RemoteError> {
        self.sftp
            .remove_file(path)
            .await
            .map_err(|e| remote_error(path, e))
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), RemoteError> {
        self.sftp
            .rename(from, to)
            .await
            .map_err(|e| remote_error(from, e))
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    async fn close(&mut self) -> Result<(), RemoteError> {
        if let Err(e) = self.sftp.close().await {
            debug!(error = %e, "Error closing SFTP subsystem");
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| RemoteError::Disconnected(e.to_string()))
    }
}
