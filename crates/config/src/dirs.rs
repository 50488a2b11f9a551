//! XDG directory utilities
//!
//! Follows the XDG Base Directory specification using the `xdg` crate:
//! - `XDG_CONFIG_HOME` defaults to ~/.config
//! - `XDG_DATA_HOME` defaults to ~/.local/share
//! - `XDG_STATE_HOME` defaults to ~/.local/state
//! - `XDG_CACHE_HOME` defaults to ~/.cache

use std::path::PathBuf;
use xdg::BaseDirectories;

const PREFIX: &str = "hearth";

/// `$XDG_CONFIG_HOME/hearth`
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix(PREFIX).get_config_home()
}

/// `$XDG_DATA_HOME/hearth`
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix(PREFIX).get_data_home()
}

/// `$XDG_STATE_HOME/hearth`
#[must_use]
pub fn state_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix(PREFIX).get_state_home()
}

/// `$XDG_CACHE_HOME/hearth`
#[must_use]
pub fn cache_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix(PREFIX).get_cache_home()
}

/// Default source directory, the data directory itself
#[must_use]
pub fn default_source_dir() -> Option<PathBuf> {
    data_dir()
}

/// `$XDG_CONFIG_HOME/hearth/config.toml`
#[must_use]
pub fn default_config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// `$XDG_STATE_HOME/hearth/state.db`
#[must_use]
pub fn state_file() -> Option<PathBuf> {
    state_dir().map(|d| d.join("state.db"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_dirs_are_prefixed() {
        for dir in [config_dir(), data_dir(), state_dir(), cache_dir()]
            .into_iter()
            .flatten()
        {
            assert!(dir.is_absolute(), "{dir:?}");
            assert!(dir.ends_with("hearth"), "{dir:?}");
        }
    }

    #[test]
    fn test_file_names() {
        if let Some(path) = default_config_file() {
            assert!(path.ends_with("hearth/config.toml"));
        }
        if let Some(path) = state_file() {
            assert!(path.ends_with("hearth/state.db"));
        }
        assert_eq!(default_source_dir(), data_dir());
    }
}
