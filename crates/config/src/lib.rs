//! Configuration management for hearth
//!
//! This crate handles:
//! - Configuration loading and path resolution
//! - XDG directory management
//! - Logging initialization

pub mod config;
pub mod dirs;
pub mod logging;

// Re-export error types from core
pub use hearth_core::{Error, Result};

pub use config::{AddConfig, AgeConfig, ApplyConfig, Config, GeneralConfig, SecretsMode};
pub use dirs::{cache_dir, config_dir, data_dir, default_config_file, default_source_dir, state_dir, state_file};
