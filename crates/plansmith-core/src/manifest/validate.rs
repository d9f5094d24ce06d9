//! Shape validation: turns a parsed [`ManifestDocument`] into a [`Manifest`].
//!
//! Runs before any filesystem effect. Checks:
//! - `files` exists and is a sequence.
//! - Every entry is a mapping with a non-empty string `path` that stays
//!   inside the project root.
//! - `content`, when present, is a string (absent or null means empty file).
//! - `notes`, when present and not null, is a string.
//! - An empty `files` sequence is accepted or refused per [`EmptyPolicy`].

use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use super::parser::{ManifestDocument, kind_of};
use super::paths::{PathEscape, resolve_within};
use super::{FileEntry, Manifest};

/// What to do with a manifest whose `files` sequence is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPolicy {
    /// Treat it as a failed attempt so the next provider gets a turn.
    #[default]
    Reject,
    /// Treat it as a valid manifest that writes nothing.
    Accept,
}

impl EmptyPolicy {
    pub fn from_allow_empty(allow_empty: bool) -> Self {
        if allow_empty { Self::Accept } else { Self::Reject }
    }
}

/// Errors from validating a parsed manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("manifest has no `files` field")]
    MissingFiles,

    #[error("`files` is {found}, expected a sequence")]
    FilesNotSequence { found: &'static str },

    #[error("files[{index}] is {found}, expected a mapping")]
    EntryNotMapping { index: usize, found: &'static str },

    #[error("files[{index}] has no non-empty string `path`")]
    MissingPath { index: usize },

    #[error("files[{index}] `content` is {found}, expected a string")]
    ContentNotString { index: usize, found: &'static str },

    #[error("files[{index}] path is not allowed: {reason}")]
    PathEscapesRoot { index: usize, reason: PathEscape },

    #[error("files[{index}] path {path:?} would overwrite the {artifact} artifact")]
    ReservedPath {
        index: usize,
        path: String,
        artifact: String,
    },

    #[error("`notes` is {found}, expected a string")]
    NotesNotString { found: &'static str },

    #[error("manifest contains no files")]
    EmptyManifest,
}

/// Check `document` and build the typed [`Manifest`].
pub fn validate(document: ManifestDocument, policy: EmptyPolicy) -> Result<Manifest, ValidationError> {
    let mut map = document.into_inner();

    let raw_files = match map.remove("files") {
        None | Some(Value::Null) => return Err(ValidationError::MissingFiles),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ValidationError::FilesNotSequence {
                found: kind_of(&other),
            });
        }
    };

    let notes = match map.remove("notes") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            return Err(ValidationError::NotesNotString {
                found: kind_of(&other),
            });
        }
    };

    let mut files = Vec::with_capacity(raw_files.len());
    for (index, item) in raw_files.into_iter().enumerate() {
        files.push(validate_entry(index, item)?);
    }

    if files.is_empty() && policy == EmptyPolicy::Reject {
        return Err(ValidationError::EmptyManifest);
    }

    Ok(Manifest { files, notes })
}

fn validate_entry(index: usize, item: Value) -> Result<FileEntry, ValidationError> {
    let mut entry = match item {
        Value::Object(entry) => entry,
        other => {
            return Err(ValidationError::EntryNotMapping {
                index,
                found: kind_of(&other),
            });
        }
    };

    let path = match entry.remove("path") {
        Some(Value::String(p)) if !p.trim().is_empty() => p,
        _ => return Err(ValidationError::MissingPath { index }),
    };

    // The root is irrelevant to a lexical check; any base works.
    resolve_within(Path::new(""), &path)
        .map_err(|reason| ValidationError::PathEscapesRoot { index, reason })?;

    let content = match entry.remove("content") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(c)) => c,
        Some(other) => {
            return Err(ValidationError::ContentNotString {
                index,
                found: kind_of(&other),
            });
        }
    };

    Ok(FileEntry { path, content })
}
