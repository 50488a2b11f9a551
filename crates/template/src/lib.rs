//! # Hearth Template
//!
//! minijinja-based implementation of [`hearth_core::TemplateRenderer`].
//!
//! Templates see the user's `[variables]` at the top level and a `hearth`
//! object with `source_dir`, `dest_dir`, `os` and `arch`.

pub mod context;
pub mod engine;
pub mod functions;

pub use context::{HearthInfo, TemplateContext};
pub use engine::TemplateEngine;

use thiserror::Error;

/// Result type for template operations
pub type Result<T> = std::result::Result<T, Error>;

/// Template engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Template rendering error
    #[error("Template error at {location}: {message}")]
    Render { location: String, message: String },

    /// Template is not valid UTF-8 or could not be parsed
    #[error("Template syntax error: {0}")]
    Syntax(String),

    /// Context could not be serialized
    #[error("Template context error: {0}")]
    Context(#[from] serde_json::Error),
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        let location = match (err.name(), err.line()) {
            (Some(name), Some(line)) => format!("{name} line {line}"),
            (None, Some(line)) => format!("line {line}"),
            (Some(name), None) => name.to_string(),
            (None, None) => "unknown location".to_string(),
        };

        Error::Render {
            location,
            message: err.to_string(),
        }
    }
}

impl From<Error> for hearth_core::Error {
    fn from(err: Error) -> Self {
        hearth_core::Error::Template(err.to_string())
    }
}
