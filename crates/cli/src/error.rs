//! Error types for CLI commands
//!
//! Engine errors pass through unchanged so the offending path and cause
//! reach the user; everything else is glue wrapped in `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

/// Error data for `PathNotUnderDestination`
///
/// Separated to allow boxing and reduce `CommandError` enum size
#[derive(Debug)]
pub struct PathNotUnderDestinationError {
    /// The path that is not under the destination directory
    pub path: PathBuf,
    /// The destination directory path
    pub dest_dir: PathBuf,
}

/// Errors that can occur during command execution
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CommandError {
    /// Failed to set up encryption from the configured keys
    #[error("Failed to load age keys: {0}")]
    AgeKeys(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid path error
    #[error("Invalid path: {path}")]
    InvalidPath {
        /// The invalid path
        path: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Path not under destination directory
    #[error("Path {} is not under destination directory {}", .0.path.display(), .0.dest_dir.display())]
    PathNotUnderDestination(Box<PathNotUnderDestinationError>),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Template rendering error
    #[error("Template error: {0}")]
    TemplateError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Some entries could not be added
    #[error("Add failed: {failed} out of {total} entries")]
    AddFailed {
        /// Number of entries that failed
        failed: usize,
        /// Total number of entries
        total: usize,
    },

    /// Some scripts failed during apply
    #[error("Apply failed: {failed} out of {total} entries")]
    ApplyFailed {
        /// Number of entries that failed
        failed: usize,
        /// Total number of entries
        total: usize,
    },

    /// Reconciliation error
    #[error(transparent)]
    Engine(#[from] hearth_engine::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<hearth_core::Error> for CommandError {
    fn from(err: hearth_core::Error) -> Self {
        Self::Engine(err.into())
    }
}

/// Result type alias for command operations
pub type Result<T> = std::result::Result<T, CommandError>;

impl CommandError {
    /// Create a `PathNotUnderDestination` error
    #[must_use]
    pub fn path_not_under_dest(path: PathBuf, dest_dir: PathBuf) -> Self {
        Self::PathNotUnderDestination(Box::new(PathNotUnderDestinationError { path, dest_dir }))
    }

    /// Create an `AgeKeys` error from any error type
    pub fn age_keys<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::AgeKeys(Box::new(err))
    }

    /// Create a `ConfigError` from any error type
    pub fn config<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::ConfigError(Box::new(err))
    }

    /// Create a `TemplateError` from any error type
    pub fn template<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::TemplateError(Box::new(err))
    }
}
