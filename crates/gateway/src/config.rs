//! Configuration management for the SFTP gateway.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/sftp-gateway/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{Credential, HostKeyPolicy, RemoteEndpoint};

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("remote.host must not be empty")]
    MissingHost,

    #[error("remote.port must be between 1 and 65535, got {0}")]
    InvalidPort(u16),

    #[error("remote.user must not be empty")]
    MissingUser,

    #[error("one of remote.password or remote.private_key must be set")]
    MissingCredential,

    #[error("remote.password and remote.private_key are mutually exclusive")]
    ConflictingCredentials,

    #[error("remote.private_key does not exist: {0}")]
    InvalidPrivateKeyPath(String),

    #[error("remote.known_hosts does not exist: {0}")]
    InvalidKnownHostsPath(String),

    #[error("directories.local_root must not be empty")]
    MissingLocalRoot,

    #[error("directories.remote_root must be an absolute path, got {0:?}")]
    RelativeRemoteRoot(String),

    #[error("transfer.round_trip_timeout_secs must be between 1 and 86400, got {0}")]
    InvalidRoundTripTimeout(u64),

    #[error("pool.max_sessions must be between 1 and 64, got {0}")]
    InvalidMaxSessions(usize),

    #[error("pool.connect_timeout_secs must be between 1 and 600, got {0}")]
    InvalidConnectTimeout(u64),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the SFTP gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Remote endpoint and credentials.
    pub remote: RemoteConfig,

    /// Local and remote root directories.
    pub directories: DirectoryConfig,

    /// Transfer policy.
    pub transfer: TransferConfig,

    /// Session pool sizing.
    pub pool: PoolConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Remote endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Host name or address of the SFTP server.
    pub host: String,

    /// SSH port.
    pub port: u16,

    /// Login user.
    pub user: String,

    /// Password, if password authentication is used.
    pub password: Option<String>,

    /// Private key file, if public key authentication is used.
    pub private_key: Option<PathBuf>,

    /// Passphrase for the private key.
    pub private_key_passphrase: Option<String>,

    /// known_hosts file. Unset means `~/.ssh/known_hosts`.
    pub known_hosts: Option<PathBuf>,

    /// Host key trust policy (strict, accept-new, accept-any).
    pub host_key_policy: HostKeyPolicy,
}

/// Root directories that every path is resolved against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Local directory downloads land in and uploads are read from.
    pub local_root: PathBuf,

    /// Remote directory used when a request does not name one.
    pub remote_root: String,
}

/// Transfer policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    /// Deadline for a single request/reply round trip, in seconds.
    pub round_trip_timeout_secs: u64,

    /// Create missing local directories before downloading.
    pub create_local_dirs: bool,

    /// Create missing remote directories before uploading.
    pub create_remote_dirs: bool,
}

/// Session pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of concurrently open sessions.
    pub max_sessions: usize,

    /// Idle sessions older than this are closed instead of reused, in seconds.
    pub idle_timeout_secs: u64,

    /// Deadline for establishing a new session, in seconds.
    pub connect_timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            user: String::new(),
            password: None,
            private_key: None,
            private_key_passphrase: None,
            known_hosts: None,
            host_key_policy: HostKeyPolicy::Strict,
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            local_root: default_local_root(),
            remote_root: "/".to_string(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            round_trip_timeout_secs: 60,
            create_local_dirs: false,
            create_remote_dirs: false,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: 4,
            idle_timeout_secs: 300, // 5 minutes
            connect_timeout_secs: 15,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl PoolConfig {
    /// Idle timeout as a duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl TransferConfig {
    /// Round-trip deadline as a duration.
    pub fn round_trip_timeout(&self) -> Duration {
        Duration::from_secs(self.round_trip_timeout_secs)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sftp-gateway")
        .join("config.toml")
}

/// Returns the default local root directory.
fn default_local_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sftp-gateway")
        .join("local")
}

/// Read a non-empty environment variable.
fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Empty values are ignored. Supported variables:
    /// - SFTP_GATEWAY_HOST, SFTP_GATEWAY_PORT, SFTP_GATEWAY_USER
    /// - SFTP_GATEWAY_PASSWORD
    /// - SFTP_GATEWAY_LOCAL_ROOT, SFTP_GATEWAY_REMOTE_ROOT
    /// - SFTP_GATEWAY_LOG_LEVEL
    pub fn apply_env_overrides(&mut self) {
        if let Some(host) = env_override("SFTP_GATEWAY_HOST") {
            tracing::info!("Overriding remote.host from environment: {}", host);
            self.remote.host = host;
        }

        if let Some(port) = env_override("SFTP_GATEWAY_PORT") {
            match port.parse() {
                Ok(port) => self.remote.port = port,
                Err(_) => tracing::warn!("Ignoring invalid SFTP_GATEWAY_PORT: {}", port),
            }
        }

        if let Some(user) = env_override("SFTP_GATEWAY_USER") {
            tracing::info!("Overriding remote.user from environment: {}", user);
            self.remote.user = user;
        }

        if let Some(password) = env_override("SFTP_GATEWAY_PASSWORD") {
            tracing::info!("Using remote.password from environment");
            self.remote.password = Some(password);
        }

        if let Some(root) = env_override("SFTP_GATEWAY_LOCAL_ROOT") {
            tracing::info!("Overriding directories.local_root from environment: {}", root);
            self.directories.local_root = PathBuf::from(root);
        }

        if let Some(root) = env_override("SFTP_GATEWAY_REMOTE_ROOT") {
            tracing::info!("Overriding directories.remote_root from environment: {}", root);
            self.directories.remote_root = root;
        }

        if let Some(level) = env_override("SFTP_GATEWAY_LOG_LEVEL") {
            tracing::info!("Overriding log_level from environment: {}", level);
            self.logging.log_level = level;
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is missing or outside
    /// the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let remote = &self.remote;

        if remote.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }

        if remote.port == 0 {
            return Err(ConfigError::InvalidPort(remote.port));
        }

        if remote.user.trim().is_empty() {
            return Err(ConfigError::MissingUser);
        }

        let has_password = remote.password.as_deref().is_some_and(|p| !p.is_empty());
        match (has_password, &remote.private_key) {
            (false, None) => return Err(ConfigError::MissingCredential),
            (true, Some(_)) => return Err(ConfigError::ConflictingCredentials),
            (false, Some(key)) if !key.exists() => {
                return Err(ConfigError::InvalidPrivateKeyPath(
                    key.display().to_string(),
                ));
            }
            _ => {}
        }

        if let Some(known_hosts) = &remote.known_hosts {
            // accept-new creates the file on first contact
            if remote.host_key_policy == HostKeyPolicy::Strict && !known_hosts.exists() {
                return Err(ConfigError::InvalidKnownHostsPath(
                    known_hosts.display().to_string(),
                ));
            }
        }

        if self.directories.local_root.as_os_str().is_empty() {
            return Err(ConfigError::MissingLocalRoot);
        }

        if !self.directories.remote_root.starts_with('/') {
            return Err(ConfigError::RelativeRemoteRoot(
                self.directories.remote_root.clone(),
            ));
        }

        let timeout = self.transfer.round_trip_timeout_secs;
        if timeout == 0 || timeout > 86_400 {
            return Err(ConfigError::InvalidRoundTripTimeout(timeout));
        }

        if self.pool.max_sessions < 1 || self.pool.max_sessions > 64 {
            return Err(ConfigError::InvalidMaxSessions(self.pool.max_sessions));
        }

        let connect = self.pool.connect_timeout_secs;
        if connect == 0 || connect > 600 {
            return Err(ConfigError::InvalidConnectTimeout(connect));
        }

        let level = self.logging.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.log_level.clone()));
        }

        Ok(())
    }

    /// Build the remote endpoint description.
    ///
    /// Validates the configuration first, so the endpoint always carries
    /// exactly one credential.
    pub fn endpoint(&self) -> Result<RemoteEndpoint, ConfigError> {
        self.validate()?;

        let remote = &self.remote;
        let credential = match (&remote.password, &remote.private_key) {
            (_, Some(path)) => Credential::PrivateKey {
                path: path.clone(),
                passphrase: remote.private_key_passphrase.clone(),
            },
            (Some(password), None) => Credential::Password(password.clone()),
            (None, None) => return Err(ConfigError::MissingCredential),
        };

        Ok(RemoteEndpoint {
            host: remote.host.trim().to_string(),
            port: remote.port,
            user: remote.user.trim().to_string(),
            credential,
            host_key_policy: remote.host_key_policy,
            known_hosts: remote.known_hosts.clone(),
        })
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
