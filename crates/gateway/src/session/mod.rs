//! Session management for the remote endpoint.
//!
//! This module provides:
//! - [`RemoteEndpoint`]: the immutable host, credential and trust settings
//! - [`SessionFactory`]: opens authenticated sessions to the endpoint
//! - [`SessionPool`]: bounded, concurrent borrow/return of sessions

pub mod endpoint;
pub mod factory;
pub mod pool;

pub use endpoint::{Credential, HostKeyPolicy, RemoteEndpoint};
pub use factory::SessionFactory;
pub use pool::{PoolStats, PooledSession, SessionPool};
