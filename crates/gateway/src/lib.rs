//! # SFTP Transfer Gateway Library
//!
//! This crate provides a session-managed gateway for moving files between a
//! local directory tree and a remote SFTP server.
//!
//! ## Overview
//!
//! Callers issue list, get, put and multi-file requests against the
//! gateway. The gateway takes care of:
//!
//! - **Session Pooling**: A bounded pool of authenticated SFTP sessions,
//!   reused across requests and discarded when a connection dies
//! - **Preconditions**: Local files and patterns are checked before any
//!   session is borrowed
//! - **Safe Replacement**: Transfers go to a temporary name first and
//!   replace the target only when complete
//! - **Error Classification**: Every failure surfaces as a typed
//!   [`GatewayError`] with a protocol error code
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Transfer Gateway                          │
//! │        (preconditions, round-trip deadline, reporting)          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌────────┐ ┌────────┐ ┌────────┐ ┌──────────┐ ┌──────────────┐ │
//! │  │  List  │ │  Get   │ │  Put   │ │ MultiGet │ │   MultiPut   │ │
//! │  └────────┘ └────────┘ └────────┘ └──────────┘ └──────────────┘ │
//! │                                                                  │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │           Session Pool  ──►  Session Factory               │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! │                                                                  │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │              SFTP over SSH (russh / russh-sftp)            │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gateway::{Config, TransferGateway};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::load_default()?;
//!     config.apply_env_overrides();
//!     config.validate()?;
//!
//!     let gateway = TransferGateway::connect(&config)?;
//!
//!     for entry in gateway.list(None).await? {
//!         println!("{} ({} bytes)", entry.name, entry.size);
//!     }
//!
//!     let local = gateway.get("reports/january.csv").await?;
//!     println!("downloaded to {}", local.display());
//!
//!     gateway.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading, environment overrides, validation
//! - [`error`]: Error types and their protocol mapping
//! - [`session`]: Endpoint description, session factory and pool
//! - [`remote`]: Remote client trait and the SFTP implementation
//! - [`files`]: Local/remote path resolution and local pattern expansion
//! - [`handlers`]: One outbound handler per operation
//! - [`gateway`]: The public facade

pub mod config;
pub mod error;
pub mod files;
pub mod gateway;
pub mod handlers;
pub mod remote;
pub mod session;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export error types for convenience
pub use error::{ConnectError, GatewayError, RemoteError, Result};

// Re-export gateway types for convenience
pub use gateway::{FileOutcome, GatewaySettings, MultiPutReport, TransferGateway};

// Re-export session types for convenience
pub use session::{
    Credential, HostKeyPolicy, PoolStats, PooledSession, RemoteEndpoint, SessionFactory,
    SessionPool,
};

// Re-export remote types for convenience
pub use remote::{Connector, EntryKind, RemoteClient, RemoteFileEntry, SftpClient, SshConnector};

// Re-export handler types for convenience
pub use handlers::{Operation, TransferRequest};
