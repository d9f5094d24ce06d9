//! Lexical containment of manifest paths inside the project root.
//!
//! Normalization is purely lexical: the filesystem is never consulted, so a
//! path is judged the same way before and after the files exist. Symlinks
//! already on disk are checked separately, right before writing.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Why a manifest path was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathEscape {
    #[error("path is empty")]
    Empty,

    #[error("path {0:?} is absolute")]
    Absolute(String),

    #[error("path {0:?} climbs above the project root")]
    ParentTraversal(String),

    #[error("path {0:?} does not name a file")]
    NotAFile(String),

    #[error("path {0:?} leaves the project root through a symbolic link")]
    ThroughSymlink(String),
}

/// Normalize `relative` and join it onto `root`.
///
/// `.` segments are dropped and `..` pops the previous segment; any `..` that
/// would leave the root, any absolute/prefixed path, and anything normalizing
/// to the root itself are refused.
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf, PathEscape> {
    if relative.trim().is_empty() {
        return Err(PathEscape::Empty);
    }

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(PathEscape::ParentTraversal(relative.to_owned()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathEscape::Absolute(relative.to_owned()));
            }
        }
    }

    if parts.is_empty() || relative.ends_with('/') || relative.ends_with('\\') {
        return Err(PathEscape::NotAFile(relative.to_owned()));
    }

    let mut resolved = root.to_path_buf();
    resolved.extend(parts);
    Ok(resolved)
}
