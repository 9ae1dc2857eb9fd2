//! Remote endpoint description.
//!
//! A [`RemoteEndpoint`] is built once from configuration and stays immutable
//! for the lifetime of the process. Every pooled session connects to it.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// How the server's host key is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// The key must already be present in known_hosts.
    #[default]
    Strict,
    /// Unknown keys are learned into known_hosts; changed keys are rejected.
    AcceptNew,
    /// Any key is accepted. Exposes the session to man-in-the-middle attacks.
    AcceptAny,
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKeyPolicy::Strict => write!(f, "strict"),
            HostKeyPolicy::AcceptNew => write!(f, "accept-new"),
            HostKeyPolicy::AcceptAny => write!(f, "accept-any"),
        }
    }
}

/// Credential used to authenticate the session.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Password authentication.
    Password(String),
    /// Public key authentication with a private key file.
    PrivateKey {
        /// Path to the private key material.
        path: PathBuf,
        /// Passphrase protecting the key, if any.
        passphrase: Option<String>,
    },
}

// Keeps secrets out of logs and panics.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(***)"),
            Credential::PrivateKey { path, passphrase } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

impl Credential {
    /// Short name of the authentication method, for logging.
    pub fn method(&self) -> &'static str {
        match self {
            Credential::Password(_) => "password",
            Credential::PrivateKey { .. } => "publickey",
        }
    }
}

/// The single remote host this process talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    /// Host name or address.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Authentication credential.
    pub credential: Credential,
    /// Host key trust policy.
    pub host_key_policy: HostKeyPolicy,
    /// known_hosts file. `None` uses the user's default file.
    pub known_hosts: Option<PathBuf>,
}

impl RemoteEndpoint {
    /// `user@host:port`, for logging.
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }

    /// Check the endpoint is complete enough to connect with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::MissingUser);
        }
        if let Credential::Password(password) = &self.credential {
            if password.is_empty() {
                return Err(ConfigError::MissingCredential);
            }
        }
        Ok(())
    }
}
