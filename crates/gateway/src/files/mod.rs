//! Local and remote path handling.
//!
//! This module provides:
//! - Path resolution against the configured local and remote roots
//! - Glob expansion of local file patterns for multi-file uploads
//!
//! # Security
//!
//! Caller-supplied local paths are always resolved below the local root.
//! Absolute paths and `..` components are rejected before touching the
//! filesystem.

pub mod paths;
pub mod pattern;

pub use pattern::{LocalFileSet, PatternResolver};
