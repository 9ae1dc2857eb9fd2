//! Transfer gateway facade.
//!
//! The single entry point for callers. Each public operation checks its
//! preconditions locally, borrows a session from the pool, runs the
//! matching handler under the round-trip deadline and returns the session.
//! Failures are always classified as a [`GatewayError`]; nothing is
//! swallowed or only logged.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use protocol::messages::{
    GetResponse, MultiGetResponse, MultiPutResponse, PutResponse, TransferFailure,
};
use protocol::{Command, Reply};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{Config, ConfigError};
use crate::error::{GatewayError, Result};
use crate::files::{paths, PatternResolver};
use crate::handlers::{
    GetHandler, ListHandler, MultiGetHandler, MultiPutHandler, Operation, OutboundHandler,
    PutHandler, TransferRequest,
};
use crate::remote::{Connector, RemoteFileEntry, SshConnector};
use crate::session::{SessionFactory, SessionPool};

/// Directory and policy settings shared by the gateway and its handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Local directory downloads land in and uploads are read from.
    pub local_root: PathBuf,
    /// Remote directory relative paths are resolved against.
    pub remote_root: String,
    /// Deadline for one request/reply round trip.
    pub round_trip_timeout: Duration,
    /// Create a missing local root before downloading.
    pub create_local_dirs: bool,
    /// Create missing remote directories before uploading.
    pub create_remote_dirs: bool,
}

impl GatewaySettings {
    /// Settings with the default timeout and no directory auto-creation.
    pub fn new(local_root: impl AsRef<Path>, remote_root: impl Into<String>) -> Self {
        Self {
            local_root: local_root.as_ref().to_path_buf(),
            remote_root: remote_root.into(),
            round_trip_timeout: Duration::from_secs(60),
            create_local_dirs: false,
            create_remote_dirs: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            local_root: config.directories.local_root.clone(),
            remote_root: config.directories.remote_root.clone(),
            round_trip_timeout: config.transfer.round_trip_timeout(),
            create_local_dirs: config.transfer.create_local_dirs,
            create_remote_dirs: config.transfer.create_remote_dirs,
        }
    }

    pub fn with_round_trip_timeout(mut self, timeout: Duration) -> Self {
        self.round_trip_timeout = timeout;
        self
    }

    pub fn with_create_local_dirs(mut self, create: bool) -> Self {
        self.create_local_dirs = create;
        self
    }

    pub fn with_create_remote_dirs(mut self, create: bool) -> Self {
        self.create_remote_dirs = create;
        self
    }
}

/// Outcome of one file in a multi-file upload.
#[derive(Debug)]
pub struct FileOutcome {
    /// The matched local file.
    pub local_path: PathBuf,
    /// Remote path on success, or why the upload failed.
    pub result: Result<String>,
}

/// Per-file results of a multi-file upload, in discovery order.
///
/// Holds exactly one outcome per matched local file.
#[derive(Debug, Default)]
pub struct MultiPutReport {
    pub outcomes: Vec<FileOutcome>,
}

impl MultiPutReport {
    /// Remote paths of the files that were uploaded.
    pub fn remote_paths(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(String::as_str))
            .collect()
    }

    /// Files that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &GatewayError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.local_path.as_path(), e)))
    }

    /// Whether every file was uploaded.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Convert to the protocol reply body.
    pub fn to_response(&self) -> MultiPutResponse {
        MultiPutResponse {
            remote_paths: self.remote_paths().into_iter().map(String::from).collect(),
            failures: self
                .failures()
                .map(|(path, error)| TransferFailure {
                    local_path: path.display().to_string(),
                    error: error.to_error_message(),
                })
                .collect(),
        }
    }
}

/// Session-managed gateway to one remote endpoint.
pub struct TransferGateway {
    settings: Arc<GatewaySettings>,
    pool: SessionPool,
    resolver: PatternResolver,
    list_handler: ListHandler,
    get_handler: GetHandler,
    put_handler: PutHandler,
    mget_handler: MultiGetHandler,
    mput_handler: MultiPutHandler,
}

impl TransferGateway {
    /// Create a gateway over an existing pool.
    pub fn new(settings: GatewaySettings, pool: SessionPool) -> Self {
        let settings = Arc::new(settings);
        Self {
            list_handler: ListHandler::new(settings.clone()),
            get_handler: GetHandler::new(settings.clone()),
            put_handler: PutHandler::new(settings.clone()),
            mget_handler: MultiGetHandler::new(settings.clone()),
            mput_handler: MultiPutHandler::new(settings.clone()),
            resolver: PatternResolver::new(),
            settings,
            pool,
        }
    }

    /// Build an SFTP-backed gateway from configuration.
    ///
    /// Sessions are opened lazily, so this does not touch the network.
    pub fn connect(config: &Config) -> std::result::Result<Self, ConfigError> {
        Self::with_connector(config, Arc::new(SshConnector::new()))
    }

    /// Build a gateway from configuration with a custom connector.
    pub fn with_connector(
        config: &Config,
        connector: Arc<dyn Connector>,
    ) -> std::result::Result<Self, ConfigError> {
        let endpoint = config.endpoint()?;
        let factory = SessionFactory::new(endpoint, connector, config.pool.connect_timeout())?;
        let pool = SessionPool::new(factory, &config.pool);
        Ok(Self::new(GatewaySettings::from_config(config), pool))
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    /// Run one request on a borrowed session under the round-trip deadline.
    ///
    /// Sessions are released after the handler returns, or discarded if the
    /// handler reports a dead connection. A timed-out round trip drops the
    /// session guard, which discards the session.
    async fn dispatch<H: OutboundHandler>(
        &self,
        handler: &H,
        request: TransferRequest,
    ) -> Result<H::Output> {
        let deadline = self.settings.round_trip_timeout;
        let span = info_span!(
            "request",
            request_id = %request.id,
            operation = %handler.operation()
        );

        let round_trip = async {
            let mut session = self.pool.acquire().await?;
            debug!(session_id = session.id(), path = %request.path, "Dispatching");

            let result = handler.handle(&mut *session, &request).await;
            match &result {
                Err(e) if e.is_session_fatal() => session.discard().await,
                _ => session.release().await,
            }
            result
        };

        match tokio::time::timeout(deadline, round_trip).instrument(span).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    request_id = %request.id,
                    operation = %handler.operation(),
                    timeout = ?deadline,
                    "No reply within round-trip deadline"
                );
                Err(GatewayError::Timeout(deadline))
            }
        }
    }

    /// Check the local root before a download when it may not be created.
    fn check_local_root(&self) -> Result<()> {
        if !self.settings.create_local_dirs && !self.settings.local_root.is_dir() {
            return Err(GatewayError::LocalDirectoryMissing(
                self.settings.local_root.clone(),
            ));
        }
        Ok(())
    }

    /// List a remote directory. `None` or an empty string lists the remote
    /// root.
    pub async fn list(&self, directory: Option<&str>) -> Result<Vec<RemoteFileEntry>> {
        let directory = directory.unwrap_or("").trim();
        paths::resolve_remote(&self.settings.remote_root, directory)?;

        let request = TransferRequest::new(Operation::List, directory);
        self.dispatch(&self.list_handler, request).await
    }

    /// Download one remote file into the local root.
    ///
    /// Returns the local path after checking the file is really there.
    pub async fn get(&self, remote_file_path: &str) -> Result<PathBuf> {
        let remote_file_path = remote_file_path.trim();
        if remote_file_path.is_empty() {
            return Err(GatewayError::InvalidArgument("remote_file_path"));
        }
        paths::resolve_remote(&self.settings.remote_root, remote_file_path)?;
        self.check_local_root()?;

        let request = TransferRequest::new(Operation::Get, remote_file_path);
        let local = self.dispatch(&self.get_handler, request).await?;

        verify_local(&local).await?;
        Ok(local)
    }

    /// Upload one local file, relative to the local root, into a remote
    /// directory. Returns the remote path.
    pub async fn put(&self, local_relative_path: &str, remote_dir: &str) -> Result<String> {
        if local_relative_path.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("local_relative_path"));
        }
        if remote_dir.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("remote_dir"));
        }
        paths::resolve_remote(&self.settings.remote_root, remote_dir)?;

        let local = paths::resolve_local(&self.settings.local_root, local_relative_path)?;
        if !local.is_file() {
            return Err(GatewayError::LocalFileNotFound(local));
        }

        let request =
            TransferRequest::new(Operation::Put, local_relative_path).with_target_dir(remote_dir);
        self.dispatch(&self.put_handler, request).await
    }

    /// Download every remote file matching a pattern into the local root.
    pub async fn mget(&self, remote_pattern: &str) -> Result<Vec<PathBuf>> {
        let remote_pattern = remote_pattern.trim();
        if remote_pattern.is_empty() {
            return Err(GatewayError::InvalidArgument("remote_pattern"));
        }
        let (dir, _) = paths::split_remote_pattern(remote_pattern);
        paths::resolve_remote(&self.settings.remote_root, dir)?;
        self.check_local_root()?;

        let request = TransferRequest::new(Operation::MultiGet, remote_pattern);
        let local_paths = self.dispatch(&self.mget_handler, request).await?;

        for local in &local_paths {
            verify_local(local).await?;
        }
        Ok(local_paths)
    }

    /// Upload every local file matching a pattern into a remote directory.
    ///
    /// The pattern is expanded locally first; zero matches fail with
    /// [`GatewayError::NoMatch`]. Files are uploaded one by one in discovery
    /// order, each as an independent request, and every file's outcome is
    /// reported.
    pub async fn mput(&self, local_pattern: &str, remote_dir: &str) -> Result<MultiPutReport> {
        let local_pattern = local_pattern.trim();
        if local_pattern.is_empty() {
            return Err(GatewayError::InvalidArgument("local_pattern"));
        }
        if remote_dir.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("remote_dir"));
        }
        paths::resolve_remote(&self.settings.remote_root, remote_dir)?;

        let files = self
            .resolver
            .expand(local_pattern, &self.settings.local_root)?;
        if files.is_empty() {
            return Err(GatewayError::NoMatch(local_pattern.to_string()));
        }

        info!(
            pattern = local_pattern,
            remote_dir,
            matched = files.len(),
            "Starting multi-file upload"
        );

        let mut report = MultiPutReport::default();
        for local_path in files {
            let result = match local_path.strip_prefix(&self.settings.local_root) {
                Ok(relative) => {
                    let request =
                        TransferRequest::new(Operation::MultiPut, relative.to_string_lossy())
                            .with_target_dir(remote_dir);
                    self.dispatch(&self.mput_handler, request).await
                }
                Err(_) => Err(GatewayError::PathEscapesRoot(
                    local_path.display().to_string(),
                )),
            };

            if let Err(e) = &result {
                warn!(local = %local_path.display(), error = %e, "Batch file failed");
            }
            report.outcomes.push(FileOutcome { local_path, result });
        }

        info!(
            pattern = local_pattern,
            uploaded = report.remote_paths().len(),
            failed = report.failures().count(),
            "Multi-file upload finished"
        );
        Ok(report)
    }

    /// Run a protocol command and turn the outcome into a protocol reply.
    pub async fn execute(&self, command: Command) -> Reply {
        let outcome = match command {
            Command::List(req) => self.list(req.directory.as_deref()).await.map(|entries| {
                Reply::Listing(entries.iter().map(RemoteFileEntry::to_protocol).collect())
            }),
            Command::Get(req) => self.get(&req.remote_file_path).await.map(|local| {
                Reply::Get(GetResponse {
                    local_path: local.display().to_string(),
                })
            }),
            Command::Put(req) => self
                .put(&req.local_relative_path, &req.remote_dir)
                .await
                .map(|remote_path| Reply::Put(PutResponse { remote_path })),
            Command::MultiGet(req) => self.mget(&req.remote_pattern).await.map(|paths| {
                Reply::MultiGet(MultiGetResponse {
                    local_paths: paths.iter().map(|p| p.display().to_string()).collect(),
                })
            }),
            Command::MultiPut(req) => self
                .mput(&req.local_pattern, &req.remote_dir)
                .await
                .map(|report| Reply::MultiPut(report.to_response())),
        };

        outcome.unwrap_or_else(|e| {
            warn!(error = %e, "Command failed");
            Reply::Error(e.to_error_message())
        })
    }

    /// Close pooled sessions. Further operations fail with a connection
    /// error.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

/// Check that a reported download really produced a local file.
async fn verify_local(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => {
            warn!(local = %path.display(), "Transfer reported success but file is missing");
            Err(GatewayError::TransferVerification(path.to_path_buf()))
        }
    }
}
