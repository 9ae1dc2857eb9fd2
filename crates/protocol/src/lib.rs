//! # SFTP Gateway Protocol Library
//!
//! This crate defines the command surface of the SFTP gateway: the commands a
//! request layer can issue, the replies it gets back and the error codes used
//! to classify failures.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Request layer (HTTP adapter, CLI)     │  Command / Reply (JSON)
//! ├─────────────────────────────────────────┤
//! │          Transfer Gateway               │  typed operations
//! ├─────────────────────────────────────────┤
//! │      Session pool + SFTP sessions       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{Command, Reply};
//! use protocol::messages::{PutRequest, PutResponse};
//!
//! let command = Command::Put(PutRequest {
//!     local_relative_path: "reports/jan.csv".to_string(),
//!     remote_dir: "/incoming".to_string(),
//! });
//! let json = command.to_json().unwrap();
//! assert_eq!(Command::from_json(&json).unwrap(), command);
//!
//! let reply = Reply::Put(PutResponse {
//!     remote_path: "/incoming/jan.csv".to_string(),
//! });
//! assert!(!reply.is_error());
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Commands, replies and error codes
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{Command, ErrorCode, ErrorMessage, FileInfo, FileType, Reply};
