//! Core types and utilities for hearth
//!
//! This is the foundation crate that all other hearth crates depend on.
//! It provides:
//! - Path types (`AbsPath`, `RelPath`, `SourceRelPath`)
//! - Base error types
//! - Collaborator traits (`EncryptionProvider`, `TemplateRenderer`)
//!
//! This crate has no dependencies on other hearth crates.

pub mod error;
pub mod path;
pub mod traits;

pub use error::{Error, Result};
pub use traits::{EncryptionProvider, TemplateRenderer};
