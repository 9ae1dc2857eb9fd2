//! Glob expansion of local file patterns.
//!
//! Supported syntax is whatever `glob-match` understands: `*`, `?`,
//! `[abc]`, `[!abc]`, `{a,b}` and `**`.
//!
//! - A bare pattern (`*.csv`) is matched against the file name of every
//!   file below the root, at any depth.
//! - A pattern with separators (`reports/*.csv`) is matched against the
//!   `/`-separated path relative to the root. The walk only descends as
//!   many levels as the pattern has segments, unless it contains `**`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::GatewayError;

/// Files matched by one pattern expansion, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileSet {
    pattern: String,
    files: Vec<PathBuf>,
}

impl LocalFileSet {
    /// The pattern this set was expanded from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The matched files as absolute paths.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter()
    }
}

impl IntoIterator for LocalFileSet {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// Expands local glob patterns against a root directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternResolver;

impl PatternResolver {
    pub fn new() -> Self {
        Self
    }

    /// Expand `pattern` against `root`.
    ///
    /// An empty result is not an error here; callers decide what an empty
    /// match means.
    pub fn expand(&self, pattern: &str, root: &Path) -> Result<LocalFileSet, GatewayError> {
        let pattern = validate_pattern(pattern)?;

        if !root.is_dir() {
            return Err(GatewayError::LocalDirectoryMissing(root.to_path_buf()));
        }

        let anchored = pattern.contains('/');
        let mut walker = WalkDir::new(root).min_depth(1).follow_links(false);
        if anchored && !pattern.contains("**") {
            walker = walker.max_depth(pattern.split('/').count());
        }

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry during pattern expansion");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let subject = if anchored {
                match relative_slash_path(root, entry.path()) {
                    Some(relative) => relative,
                    None => continue,
                }
            } else {
                entry.file_name().to_string_lossy().into_owned()
            };

            if glob_match::glob_match(pattern, &subject) {
                files.push(entry.into_path());
            }
        }

        debug!(pattern, root = %root.display(), matched = files.len(), "Expanded local pattern");
        Ok(LocalFileSet {
            pattern: pattern.to_string(),
            files,
        })
    }
}

/// Trim the pattern and reject ones that could leave the root.
fn validate_pattern(pattern: &str) -> Result<&str, GatewayError> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(GatewayError::InvalidArgument("pattern"));
    }

    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    if pattern.starts_with('/') || pattern.starts_with('\\') {
        return Err(GatewayError::PathEscapesRoot(pattern.to_string()));
    }
    if pattern.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(GatewayError::PathEscapesRoot(pattern.to_string()));
    }
    Ok(pattern)
}

/// Path of `path` relative to `root`, joined with `/`.
fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(parts.join("/"))
}
