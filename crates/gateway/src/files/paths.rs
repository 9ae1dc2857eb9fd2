//! Path resolution rules.
//!
//! Remote paths always use `/` separators regardless of the host OS, so
//! they are handled as strings rather than [`Path`]s.

use std::path::{Component, Path, PathBuf};

use crate::error::GatewayError;

/// Resolve a caller-supplied relative path below the local root.
///
/// Rejects absolute paths and any `..` component.
pub fn resolve_local(root: &Path, relative: &str) -> Result<PathBuf, GatewayError> {
    let relative = relative.trim();
    if relative.is_empty() {
        return Err(GatewayError::InvalidArgument("local path"));
    }

    let mut resolved = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(GatewayError::PathEscapesRoot(relative.to_string()));
            }
        }
    }

    if resolved == root {
        return Err(GatewayError::InvalidArgument("local path"));
    }
    Ok(resolved)
}

/// Join a remote directory and an entry name.
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Last component of a remote path. Empty for `/` or a trailing slash.
pub fn remote_basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Resolve a remote directory or file path against the remote root.
///
/// Absolute paths are used as given; relative paths are joined to the
/// root. Relative paths may not climb out of the root with `..`.
pub fn resolve_remote(root: &str, path: &str) -> Result<String, GatewayError> {
    let path = path.trim();
    if path.is_empty() || path == "." {
        return Ok(root.to_string());
    }
    if path.starts_with('/') {
        return Ok(normalize_remote(path));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(GatewayError::PathEscapesRoot(path.to_string()));
    }
    Ok(normalize_remote(&join_remote(root, path)))
}

/// Collapse repeated and trailing slashes and `.` segments.
fn normalize_remote(path: &str) -> String {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    if path.starts_with('/') {
        format!("/{}", segments.join("/"))
    } else {
        segments.join("/")
    }
}

/// Split a remote pattern into its directory part and its file-name glob.
///
/// `"/in/*.csv"` becomes `("/in", "*.csv")`; `"*.csv"` has an empty
/// directory part.
pub fn split_remote_pattern(pattern: &str) -> (&str, &str) {
    match pattern.rfind('/') {
        Some(0) => ("/", &pattern[1..]),
        Some(idx) => (&pattern[..idx], &pattern[idx + 1..]),
        None => ("", pattern),
    }
}

/// Every prefix of a remote directory, shortest first.
///
/// `"/a/b/c"` yields `["/a", "/a/b", "/a/b/c"]`.
pub fn remote_ancestors(dir: &str) -> Vec<String> {
    let absolute = dir.starts_with('/');
    let mut current = String::new();
    let mut ancestors = Vec::new();

    for segment in dir.split('/').filter(|s| !s.is_empty()) {
        if absolute || !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        ancestors.push(current.clone());
    }
    ancestors
}
