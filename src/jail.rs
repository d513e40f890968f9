//! Confinement of request paths under the served root
//!
//! Paths arrive percent-decoded. Anything that could climb out of the root
//! (`..`, drive prefixes, NUL) is refused rather than clamped, and existing
//! targets are canonicalized so a symlink cannot lead outside either.

use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum JailError {
    #[error("path escapes the served root: {0}")]
    Escape(String),

    #[error("path contains a NUL byte")]
    NullByte,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Normalize a root-relative request path to `a/b/c` form.
///
/// Leading slashes and `.` segments are dropped; the empty string names the
/// root itself.
pub fn normalize(requested: &str) -> Result<String, JailError> {
    if requested.contains('\0') {
        return Err(JailError::NullByte);
    }

    let mut segments = Vec::new();
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(segment) => match segment.to_str() {
                Some(segment) if !segment.contains('\\') => segments.push(segment),
                _ => return Err(JailError::Escape(requested.to_string())),
            },
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(JailError::Escape(requested.to_string()))
            }
        }
    }
    Ok(segments.join("/"))
}

/// Resolve a root-relative request path to a filesystem path under `root`.
///
/// `root` must already be canonical. Missing targets are returned as-is so
/// the caller can answer 404.
pub fn confine(root: &Path, requested: &str) -> Result<PathBuf, JailError> {
    let relative = normalize(requested)?;
    let resolved = if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(&relative)
    };

    match resolved.canonicalize() {
        Ok(canonical) if canonical.starts_with(root) => Ok(resolved),
        Ok(_) => Err(JailError::Escape(requested.to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(resolved),
        Err(e) => Err(JailError::Io(e)),
    }
}
