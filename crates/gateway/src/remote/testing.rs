//! In-memory remote file tree for unit tests.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Connector, EntryKind, RemoteClient, RemoteFileEntry};
use crate::error::{ConnectError, RemoteError};
use crate::session::{Credential, HostKeyPolicy, RemoteEndpoint};

const MTIME: u64 = 1_704_067_200;

pub fn test_endpoint() -> RemoteEndpoint {
    RemoteEndpoint {
        host: "sftp.example.com".to_string(),
        port: 22,
        user: "deploy".to_string(),
        credential: Credential::Password("secret".to_string()),
        host_key_policy: HostKeyPolicy::Strict,
        known_hosts: None,
    }
}

/// Open a standalone session over `fs`.
pub async fn memory_client(fs: &MemoryFs) -> Box<dyn RemoteClient> {
    MemoryConnector::new(fs.clone())
        .connect(&test_endpoint())
        .await
        .unwrap()
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Default)]
struct FsState {
    nodes: BTreeMap<String, Node>,
    failing: HashSet<String>,
    disconnecting: HashSet<String>,
    ghosts: HashSet<String>,
    racing: BTreeMap<String, Vec<u8>>,
    download_delay: Duration,
}

/// Shared in-memory file tree. Clones see the same tree.
#[derive(Clone)]
pub struct MemoryFs {
    state: Arc<Mutex<FsState>>,
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Upload target a `<target>.<id>.writing` temporary stands for.
fn upload_target(temporary: &str) -> &str {
    temporary
        .strip_suffix(".writing")
        .and_then(|s| s.rsplit_once('.'))
        .map(|(target, _)| target)
        .unwrap_or(temporary)
}

fn name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut state = FsState::default();
        state.nodes.insert("/".to_string(), Node::Dir);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FsState> {
        self.state.lock().unwrap()
    }

    pub fn add_dir(&self, path: &str) {
        let mut state = self.lock();
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            state.nodes.insert(current.clone(), Node::Dir);
        }
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        self.add_dir(parent(path));
        self.lock()
            .nodes
            .insert(path.to_string(), Node::File(data.to_vec()));
    }

    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        match self.lock().nodes.get(path) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lock().nodes.contains_key(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.lock().nodes.keys().cloned().collect()
    }

    /// Transfers touching `path` fail with a protocol failure.
    pub fn fail_on(&self, path: &str) {
        self.lock().failing.insert(path.to_string());
    }

    /// Transfers touching `path` drop the connection.
    pub fn disconnect_on(&self, path: &str) {
        self.lock().disconnecting.insert(path.to_string());
    }

    /// Downloads of `path` report success without writing anything.
    pub fn ghost_on(&self, path: &str) {
        self.lock().ghosts.insert(path.to_string());
    }

    /// The next rename onto `path` finds `data` written there by another
    /// writer in the meantime.
    pub fn race_rename_onto(&self, path: &str, data: &[u8]) {
        self.lock().racing.insert(path.to_string(), data.to_vec());
    }

    /// Downloads pause after writing the local file.
    pub fn set_download_delay(&self, delay: Duration) {
        self.lock().download_delay = delay;
    }

    fn is_ghost(&self, path: &str) -> bool {
        self.lock().ghosts.contains(path)
    }

    fn download_delay(&self) -> Duration {
        self.lock().download_delay
    }

    fn check_faults(&self, path: &str) -> Result<(), RemoteError> {
        let state = self.lock();
        if state.disconnecting.contains(path) {
            return Err(RemoteError::Disconnected(format!("connection lost at {path}")));
        }
        if state.failing.contains(path) {
            return Err(RemoteError::Failure(format!("{path}: injected failure")));
        }
        Ok(())
    }
}

/// Connector handing out [`MemoryClient`]s over one [`MemoryFs`].
pub struct MemoryConnector {
    fs: MemoryFs,
    connections: AtomicUsize,
    closed: Arc<AtomicUsize>,
    fail_auth: AtomicBool,
    delay: Mutex<Duration>,
    live: Mutex<Vec<Arc<AtomicBool>>>,
}

impl MemoryConnector {
    pub fn new(fs: MemoryFs) -> Self {
        Self {
            fs,
            connections: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            fail_auth: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            live: Mutex::new(Vec::new()),
        }
    }

    /// Sessions opened so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Sessions closed through [`RemoteClient::close`].
    pub fn closed_sessions(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn fail_with_auth_error(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Mark every session opened so far as disconnected.
    pub fn drop_all_connections(&self) {
        for flag in self.live.lock().unwrap().iter() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        endpoint: &RemoteEndpoint,
    ) -> Result<Box<dyn RemoteClient>, ConnectError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(ConnectError::Authentication {
                user: endpoint.user.clone(),
                host: endpoint.host.clone(),
            });
        }

        self.connections.fetch_add(1, Ordering::SeqCst);
        let disconnected = Arc::new(AtomicBool::new(false));
        self.live.lock().unwrap().push(disconnected.clone());

        Ok(Box::new(MemoryClient {
            fs: self.fs.clone(),
            disconnected,
            closed: self.closed.clone(),
        }))
    }
}

/// One session over a [`MemoryFs`].
pub struct MemoryClient {
    fs: MemoryFs,
    disconnected: Arc<AtomicBool>,
    closed: Arc<AtomicUsize>,
}

impl MemoryClient {
    fn ensure_open(&self) -> Result<(), RemoteError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(RemoteError::Disconnected("session closed".to_string()));
        }
        Ok(())
    }

    fn check_faults(&self, path: &str) -> Result<(), RemoteError> {
        let result = self.fs.check_faults(path);
        if let Err(RemoteError::Disconnected(_)) = &result {
            self.disconnected.store(true, Ordering::SeqCst);
        }
        result
    }
}

fn entry(path: &str, node: &Node) -> RemoteFileEntry {
    match node {
        Node::Dir => RemoteFileEntry {
            name: name(path).to_string(),
            kind: EntryKind::Directory,
            size: 0,
            modified_secs: MTIME,
        },
        Node::File(data) => RemoteFileEntry {
            name: name(path).to_string(),
            kind: EntryKind::File,
            size: data.len() as u64,
            modified_secs: MTIME,
        },
    }
}

#[async_trait]
impl RemoteClient for MemoryClient {
    async fn list(&mut self, dir: &str) -> Result<Vec<RemoteFileEntry>, RemoteError> {
        self.ensure_open()?;
        let state = self.fs.lock();
        match state.nodes.get(dir) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => {
                return Err(RemoteError::Failure(format!("{dir} is not a directory")));
            }
            None => return Err(RemoteError::NotFound(dir.to_string())),
        }

        Ok(state
            .nodes
            .iter()
            .filter(|(path, _)| path.as_str() != "/" && parent(path) == dir)
            .map(|(path, node)| entry(path, node))
            .collect())
    }

    async fn stat(&mut self, path: &str) -> Result<Option<RemoteFileEntry>, RemoteError> {
        self.ensure_open()?;
        Ok(self.fs.lock().nodes.get(path).map(|node| entry(path, node)))
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<u64, RemoteError> {
        self.ensure_open()?;
        self.check_faults(remote)?;
        let data = self
            .fs
            .read(remote)
            .ok_or_else(|| RemoteError::NotFound(remote.to_string()))?;
        if self.fs.is_ghost(remote) {
            return Ok(data.len() as u64);
        }
        tokio::fs::write(local, &data).await?;

        let delay = self.fs.download_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(data.len() as u64)
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, RemoteError> {
        self.ensure_open()?;
        let data = tokio::fs::read(local).await?;
        self.check_faults(upload_target(remote))?;

        let mut state = self.fs.lock();
        if !matches!(state.nodes.get(parent(remote)), Some(Node::Dir)) {
            return Err(RemoteError::NotFound(parent(remote).to_string()));
        }
        state.nodes.insert(remote.to_string(), Node::File(data.clone()));
        Ok(data.len() as u64)
    }

    async fn create_dir_all(&mut self, dir: &str) -> Result<(), RemoteError> {
        self.ensure_open()?;
        self.fs.add_dir(dir);
        Ok(())
    }

    async fn remove_file(&mut self, path: &str) -> Result<(), RemoteError> {
        self.ensure_open()?;
        match self.fs.lock().nodes.remove(path) {
            Some(Node::File(_)) => Ok(()),
            _ => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), RemoteError> {
        self.ensure_open()?;
        let mut state = self.fs.lock();
        if let Some(data) = state.racing.remove(to) {
            state.nodes.insert(to.to_string(), Node::File(data));
        }
        if state.nodes.contains_key(to) {
            return Err(RemoteError::Failure(format!("{to} already exists")));
        }
        let node = state
            .nodes
            .remove(from)
            .ok_or_else(|| RemoteError::NotFound(from.to_string()))?;
        state.nodes.insert(to.to_string(), node);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<(), RemoteError> {
        self.disconnected.store(true, Ordering::SeqCst);
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
