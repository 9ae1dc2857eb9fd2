//! Session factory.
//!
//! Owns the immutable [`RemoteEndpoint`] and opens authenticated sessions to
//! it through a [`Connector`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::endpoint::{HostKeyPolicy, RemoteEndpoint};
use crate::config::ConfigError;
use crate::error::ConnectError;
use crate::remote::{Connector, RemoteClient};

/// Opens new sessions to the configured endpoint.
pub struct SessionFactory {
    endpoint: RemoteEndpoint,
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
}

impl SessionFactory {
    /// Create a factory for `endpoint`.
    ///
    /// The endpoint is validated once here; sessions opened later never
    /// re-check it.
    pub fn new(
        endpoint: RemoteEndpoint,
        connector: Arc<dyn Connector>,
        connect_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        endpoint.validate()?;

        if endpoint.host_key_policy == HostKeyPolicy::AcceptAny {
            warn!(
                target = %endpoint.display_target(),
                "host_key_policy is accept-any: server identity will not be verified"
            );
        }

        info!(
            target = %endpoint.display_target(),
            method = endpoint.credential.method(),
            host_key_policy = %endpoint.host_key_policy,
            "Session factory ready"
        );

        Ok(Self {
            endpoint,
            connector,
            connect_timeout,
        })
    }

    /// The endpoint sessions are opened to.
    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    /// Open one authenticated session, bounded by the connect timeout.
    pub async fn connect(&self) -> Result<Box<dyn RemoteClient>, ConnectError> {
        debug!(target = %self.endpoint.display_target(), "Opening new session");

        match tokio::time::timeout(self.connect_timeout, self.connector.connect(&self.endpoint))
            .await
        {
            Ok(Ok(client)) => Ok(client),
            Ok(Err(e)) => {
                warn!(
                    target = %self.endpoint.display_target(),
                    error = %e,
                    "Failed to open session"
                );
                Err(e)
            }
            Err(_) => {
                warn!(
                    target = %self.endpoint.display_target(),
                    timeout = ?self.connect_timeout,
                    "Timed out opening session"
                );
                Err(ConnectError::TimedOut(self.connect_timeout))
            }
        }
    }
}

impl std::fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("endpoint", &self.endpoint)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
