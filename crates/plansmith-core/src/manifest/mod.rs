//! File manifests: extraction from model output, parsing, validation.

pub mod extract;
pub mod parser;
pub mod paths;
pub mod validate;

pub use extract::extract;
pub use parser::{Format, ManifestDocument, ParseError, UnknownFormat, parse};
pub use paths::{PathEscape, resolve_within};
pub use validate::{EmptyPolicy, ValidationError, validate};

/// A single file the model asked us to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the project root.
    pub path: String,
    /// Full file content. An empty string produces an empty file.
    pub content: String,
}

/// A validated set of files plus optional free-form notes from the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub files: Vec<FileEntry>,
    pub notes: Option<String>,
}

impl Manifest {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
