//! Shared fixtures for gateway integration tests.
//!
//! [`FsConnector`] serves a "remote" tree out of a temporary directory, so
//! tests can check real files on both sides of a transfer.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use gateway::{
    Config, ConnectError, Connector, EntryKind, RemoteClient, RemoteEndpoint, RemoteError,
    RemoteFileEntry, TransferGateway,
};
use tempfile::TempDir;

#[derive(Default)]
struct Faults {
    failing: HashSet<String>,
    disconnecting: HashSet<String>,
    ghosts: HashSet<String>,
}

/// Upload target a `<target>.<id>.writing` temporary stands for.
fn upload_target(temporary: &str) -> &str {
    temporary
        .strip_suffix(".writing")
        .and_then(|s| s.rsplit_once('.'))
        .map(|(target, _)| target)
        .unwrap_or(temporary)
}

/// Connector whose sessions operate on a local directory standing in for
/// the remote server.
pub struct FsConnector {
    root: PathBuf,
    connections: AtomicUsize,
    faults: Arc<Mutex<Faults>>,
    delay: Mutex<Duration>,
}

impl FsConnector {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            connections: AtomicUsize::new(0),
            faults: Arc::new(Mutex::new(Faults::default())),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Sessions opened so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Transfers of `remote_path` fail with a server-side failure.
    pub fn fail_on(&self, remote_path: &str) {
        self.faults
            .lock()
            .unwrap()
            .failing
            .insert(remote_path.to_string());
    }

    /// Transfers of `remote_path` kill the session.
    pub fn disconnect_on(&self, remote_path: &str) {
        self.faults
            .lock()
            .unwrap()
            .disconnecting
            .insert(remote_path.to_string());
    }

    /// Downloads of `remote_path` report success without writing anything.
    pub fn ghost_on(&self, remote_path: &str) {
        self.faults
            .lock()
            .unwrap()
            .ghosts
            .insert(remote_path.to_string());
    }

    /// Delay every new connection.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl Connector for FsConnector {
    async fn connect(
        &self,
        _endpoint: &RemoteEndpoint,
    ) -> Result<Box<dyn RemoteClient>, ConnectError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FsClient {
            root: self.root.clone(),
            faults: self.faults.clone(),
            closed: false,
        }))
    }
}

struct FsClient {
    root: PathBuf,
    faults: Arc<Mutex<Faults>>,
    closed: bool,
}

fn classify(path: &str, err: io::Error) -> RemoteError {
    match err.kind() {
        io::ErrorKind::NotFound => RemoteError::NotFound(path.to_string()),
        io::ErrorKind::PermissionDenied => RemoteError::PermissionDenied(path.to_string()),
        _ => RemoteError::Io(err),
    }
}

impl FsClient {
    fn local(&self, remote: &str) -> PathBuf {
        self.root.join(remote.trim_start_matches('/'))
    }

    fn ensure_open(&self) -> Result<(), RemoteError> {
        if self.closed {
            return Err(RemoteError::Disconnected("session closed".to_string()));
        }
        Ok(())
    }

    fn check_faults(&mut self, remote: &str) -> Result<(), RemoteError> {
        let faults = self.faults.lock().unwrap();
        if faults.disconnecting.contains(remote) {
            self.closed = true;
            return Err(RemoteError::Disconnected(format!("lost at {remote}")));
        }
        if faults.failing.contains(remote) {
            return Err(RemoteError::Failure(format!("{remote}: injected failure")));
        }
        Ok(())
    }

    fn entry(name: String, meta: &std::fs::Metadata) -> RemoteFileEntry {
        let modified_secs = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        RemoteFileEntry {
            name,
            kind: if meta.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            size: if meta.is_dir() { 0 } else { meta.len() },
            modified_secs,
        }
    }
}

#[async_trait]
impl RemoteClient for FsClient {
    async fn list(&mut self, dir: &str) -> Result<Vec<RemoteFileEntry>, RemoteError> {
        self.ensure_open()?;
        let mut read_dir = tokio::fs::read_dir(self.local(dir))
            .await
            .map_err(|e| classify(dir, e))?;

        let mut entries = Vec::new();
        while let Some(item) = read_dir.next_entry().await? {
            let meta = item.metadata().await?;
            entries.push(Self::entry(
                item.file_name().to_string_lossy().into_owned(),
                &meta,
            ));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&mut self, path: &str) -> Result<Option<RemoteFileEntry>, RemoteError> {
        self.ensure_open()?;
        match tokio::fs::metadata(self.local(path)).await {
            Ok(meta) => {
                let name = path.rsplit('/').next().unwrap_or(path).to_string();
                Ok(Some(Self::entry(name, &meta)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(classify(path, e)),
        }
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<u64, RemoteError> {
        self.ensure_open()?;
        self.check_faults(remote)?;
        if self.faults.lock().unwrap().ghosts.contains(remote) {
            let meta = tokio::fs::metadata(self.local(remote))
                .await
                .map_err(|e| classify(remote, e))?;
            return Ok(meta.len());
        }
        tokio::fs::copy(self.local(remote), local)
            .await
            .map_err(|e| classify(remote, e))
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, RemoteError> {
        self.ensure_open()?;
        self.check_faults(upload_target(remote))?;
        tokio::fs::copy(local, self.local(remote))
            .await
            .map_err(|e| classify(remote, e))
    }

    async fn create_dir_all(&mut self, dir: &str) -> Result<(), RemoteError> {
        self.ensure_open()?;
        tokio::fs::create_dir_all(self.local(dir))
            .await
            .map_err(|e| classify(dir, e))
    }

    async fn remove_file(&mut self, path: &str) -> Result<(), RemoteError> {
        self.ensure_open()?;
        tokio::fs::remove_file(self.local(path))
            .await
            .map_err(|e| classify(path, e))
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), RemoteError> {
        self.ensure_open()?;
        if self.local(to).exists() {
            return Err(RemoteError::Failure(format!("{to} already exists")));
        }
        tokio::fs::rename(self.local(from), self.local(to))
            .await
            .map_err(|e| classify(from, e))
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> Result<(), RemoteError> {
        self.closed = true;
        Ok(())
    }
}

/// A local tree, a remote tree and a connector serving the remote one.
pub struct TestEnv {
    pub local: TempDir,
    pub remote: TempDir,
    pub connector: Arc<FsConnector>,
}

impl TestEnv {
    pub fn new() -> Self {
        let local = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        let connector = Arc::new(FsConnector::new(remote.path()));
        Self {
            local,
            remote,
            connector,
        }
    }

    /// Valid configuration pointing at this environment.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.remote.host = "sftp.test".to_string();
        config.remote.user = "tester".to_string();
        config.remote.password = Some("secret".to_string());
        config.directories.local_root = self.local.path().to_path_buf();
        config.directories.remote_root = "/".to_string();
        config
    }

    pub fn gateway(&self) -> TransferGateway {
        self.gateway_with(|_| {})
    }

    pub fn gateway_with(&self, configure: impl FnOnce(&mut Config)) -> TransferGateway {
        let mut config = self.config();
        configure(&mut config);
        TransferGateway::with_connector(&config, self.connector.clone()).unwrap()
    }

    pub fn write_local(&self, relative: &str, data: &str) -> PathBuf {
        write_file(&self.local.path().join(relative), data)
    }

    pub fn write_remote(&self, relative: &str, data: &str) -> PathBuf {
        write_file(&self.remote.path().join(relative), data)
    }

    pub fn remote_dir(&self, relative: &str) {
        std::fs::create_dir_all(self.remote.path().join(relative)).unwrap();
    }

    pub fn read_remote(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.remote.path().join(relative)).ok()
    }

    pub fn remote_exists(&self, relative: &str) -> bool {
        self.remote.path().join(relative).exists()
    }

    /// Names in a remote directory, sorted.
    pub fn remote_names(&self, relative: &str) -> Vec<String> {
        sorted_names(&self.remote.path().join(relative))
    }

    /// Names in the local root, sorted.
    pub fn local_names(&self) -> Vec<String> {
        sorted_names(self.local.path())
    }
}

fn sorted_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn write_file(path: &Path, data: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, data).unwrap();
    path.to_path_buf()
}
