//! Error types for hearth-engine
//!
//! Every variant that concerns a filesystem entry names the path involved,
//! so a fatal abort reports the offending path and its cause directly.

use hearth_core::path::{AbsPath, RelPath, SourceRelPath};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for hearth-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hearth-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading a file
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error writing a file
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error removing a file or directory
    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error creating a directory
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreate {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error reading a directory
    #[error("Failed to read directory {path}: {source}")]
    DirectoryRead {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error with file metadata
    #[error("Failed to read metadata for {path}: {source}")]
    Metadata {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Path is not absolute
    #[error("Path must be absolute: {path}")]
    PathNotAbsolute { path: PathBuf },

    /// Path is not relative
    #[error("Path must be relative: {path}")]
    PathNotRelative { path: PathBuf },

    /// Invalid path prefix
    #[error("Path {} is not under base directory {}", path.display(), base.display())]
    InvalidPathPrefix {
        path: Arc<PathBuf>,
        base: Arc<PathBuf>,
    },

    /// Malformed path
    #[error("Path error: {0}")]
    Path(String),

    /// Source name that does not decode, or attributes that cannot be encoded
    #[error("Invalid source name '{name}': {reason}")]
    InvalidEncoding { name: String, reason: String },

    /// Duplicate attribute marker
    #[error("Duplicate attribute '{attribute}' in source name '{name}'")]
    DuplicateAttribute { name: String, attribute: String },

    /// Attribute markers out of order
    #[error(
        "Invalid attribute order in '{name}': found '{found}' after the name started.\n\
         Suggestion: {suggestion}"
    )]
    InvalidAttributeOrder {
        name: String,
        found: String,
        suggestion: String,
    },

    /// Two source entries decode to the same target
    #[error("Source entries {first} and {second} both map to target {target}")]
    DuplicateTarget {
        target: RelPath,
        first: SourceRelPath,
        second: SourceRelPath,
    },

    /// An ancestor of a target is managed as something other than a directory
    #[error("Parent of {path} is not a directory in the source state")]
    ParentNotDirectory { path: RelPath },

    /// Destination entry of a kind hearth cannot manage
    #[error("Unsupported entry type '{kind}' at {path}")]
    UnsupportedEntryType { path: AbsPath, kind: String },

    /// Destination path is protected from capture
    #[error("Refusing to capture protected path {path}")]
    ProtectedPath { path: AbsPath },

    /// A replace conflict was not resolved
    #[error("Not replacing {path}: {reason}")]
    ConflictAborted { path: RelPath, reason: String },

    /// Content scanning found likely secrets
    #[error("{path} may contain secrets ({} finding(s)): {}", findings.len(), findings.join("; "))]
    PolicyViolation { path: AbsPath, findings: Vec<String> },

    /// Script exited unsuccessfully
    #[error("Script {path} failed: {status}")]
    ScriptExecution { path: RelPath, status: String },

    /// Invalid entry type filter
    #[error("Invalid entry type '{0}'")]
    InvalidFilter(String),

    /// Template rendering error
    #[error("Template rendering failed for {path}: {message}")]
    TemplateRender { path: String, message: String },

    /// Decryption error
    #[error("Decryption failed for {path}: {message}")]
    Decryption { path: String, message: String },

    /// Encryption error
    #[error("Encryption failed for {path}: {message}")]
    Encryption { path: String, message: String },

    /// Invalid UTF-8 encountered during processing
    #[error("Invalid UTF-8 in {path}: {source}")]
    InvalidUtf8 {
        path: String,
        #[source]
        source: std::str::Utf8Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// State persistence error
    #[error("State persistence error: {0}")]
    State(String),

    /// Other error with context
    #[error("{context}: {source}")]
    Other {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<hearth_core::Error> for Error {
    fn from(err: hearth_core::Error) -> Self {
        match err {
            hearth_core::Error::PathNotAbsolute { path } => Error::PathNotAbsolute { path },
            hearth_core::Error::PathNotRelative { path } => Error::PathNotRelative { path },
            hearth_core::Error::InvalidPathPrefix { path, base } => {
                Error::InvalidPathPrefix { path, base }
            }
            hearth_core::Error::Path(message) => Error::Path(message),
            hearth_core::Error::Io(e) => Error::Io(e),
            other => Error::Other {
                context: "Shared error".to_string(),
                source: Box::new(other),
            },
        }
    }
}

impl Error {
    /// Create an error with additional context
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Other {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error came from the filesystem
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Error::FileRead { .. }
                | Error::FileWrite { .. }
                | Error::Remove { .. }
                | Error::DirectoryCreate { .. }
                | Error::DirectoryRead { .. }
                | Error::Metadata { .. }
                | Error::Io(_)
        )
    }
}
