//! Configuration management
//!
//! This module handles loading the hearth configuration file.
//!
//! ```toml
//! [general]
//! srcDir = "~/.local/share/hearth"
//! dstDir = "~"
//! encryptedSuffix = ".age"
//!
//! [add]
//! encrypt = false
//! secrets = "warning"
//! templateSymlinks = true
//!
//! [apply]
//! continueOnScriptError = false
//!
//! [age]
//! identity = "~/.config/hearth/key.txt"
//! derive = true
//!
//! [variables]
//! email = "me@example.com"
//! ```

use crate::Result;
use hearth_core::Error;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What to do when content scanning finds a likely secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretsMode {
    /// Do not scan
    Ignore,
    /// Log findings and continue
    #[default]
    Warning,
    /// Refuse to capture the file unless forced
    Error,
}

impl FromStr for SecretsMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(Error::Message(format!(
                "invalid secrets mode '{other}', expected ignore, warning or error"
            ))),
        }
    }
}

impl fmt::Display for SecretsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ignore => "ignore",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// General configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Source directory path
    #[serde(default, rename = "srcDir")]
    pub src_dir: Option<PathBuf>,

    /// Destination directory path
    #[serde(default, rename = "dstDir")]
    pub dst_dir: Option<PathBuf>,

    /// Version-control working tree holding the source directory.
    /// Defaults to the source directory itself.
    #[serde(default, rename = "workingTree")]
    pub working_tree: Option<PathBuf>,

    /// Suffix appended to encrypted source files
    #[serde(default = "default_encrypted_suffix", rename = "encryptedSuffix")]
    pub encrypted_suffix: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            src_dir: None,
            dst_dir: None,
            working_tree: None,
            encrypted_suffix: default_encrypted_suffix(),
        }
    }
}

/// Defaults for `hearth add`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddConfig {
    /// Encrypt added files by default
    #[serde(default)]
    pub encrypt: bool,

    /// Secret scanning behavior
    #[serde(default)]
    pub secrets: SecretsMode,

    /// Rewrite symlink targets under the source or destination directory as templates
    #[serde(default, rename = "templateSymlinks")]
    pub template_symlinks: bool,

    /// Keep encrypted/template/create attributes of entries that are re-added
    #[serde(default = "default_true")]
    pub inherit: bool,
}

impl Default for AddConfig {
    fn default() -> Self {
        Self {
            encrypt: false,
            secrets: SecretsMode::default(),
            template_symlinks: false,
            inherit: true,
        }
    }
}

/// Defaults for `hearth apply`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApplyConfig {
    /// Keep applying after a script exits non-zero
    #[serde(default, rename = "continueOnScriptError")]
    pub continue_on_script_error: bool,
}

/// Age encryption configuration
///
/// ```toml
/// [age]
/// identities = ["~/.config/hearth/key.txt", "~/.ssh/id_ed25519"]
/// recipients = ["age1..."]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgeConfig {
    /// Single identity file path (age or SSH key)
    pub identity: Option<PathBuf>,

    /// Multiple identity file paths
    pub identities: Option<Vec<PathBuf>>,

    /// Single recipient public key
    pub recipient: Option<String>,

    /// Multiple recipient public keys
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Derive recipients from the configured identities
    #[serde(default, alias = "symmetric")]
    pub derive: bool,
}

/// Hearth configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General configuration section
    #[serde(default)]
    pub general: GeneralConfig,

    /// `add` defaults
    #[serde(default)]
    pub add: AddConfig,

    /// `apply` defaults
    #[serde(default)]
    pub apply: ApplyConfig,

    /// Age encryption configuration
    #[serde(default)]
    pub age: AgeConfig,

    /// Template variables
    #[serde(default)]
    pub variables: IndexMap<String, serde_json::Value>,
}

fn default_encrypted_suffix() -> String {
    hearth_crypto::DEFAULT_ENCRYPTED_SUFFIX.to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file
    ///
    /// Relative paths in the file are resolved against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Message(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base_dir).map_err(|e| {
            Error::Message(format!("Failed to parse config file {}: {e}", path.display()))
        })
    }

    /// Load the file if it exists, otherwise return the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config file at {}, using defaults", path.as_ref().display());
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string, resolving paths against `base_dir`
    pub fn from_toml_str(toml_content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: Self = toml::from_str(toml_content)
            .map_err(|e| Error::Message(format!("Failed to parse config TOML: {e}")))?;

        if config.general.encrypted_suffix.is_empty() {
            return Err(Error::Message(
                "general.encryptedSuffix must not be empty".to_string(),
            ));
        }

        config.resolve_relative_paths(base_dir);
        Ok(config)
    }

    fn resolve_relative_paths(&mut self, base_dir: &Path) {
        if let Some(ref src_dir) = self.general.src_dir {
            self.general.src_dir = Some(resolve_path(src_dir, base_dir));
        }
        if let Some(ref dst_dir) = self.general.dst_dir {
            self.general.dst_dir = Some(resolve_path(dst_dir, base_dir));
        }
        if let Some(ref working_tree) = self.general.working_tree {
            self.general.working_tree = Some(resolve_path(working_tree, base_dir));
        }
        if let Some(ref identity) = self.age.identity {
            self.age.identity = Some(resolve_path(identity, base_dir));
        }
        if let Some(ref identities) = self.age.identities {
            self.age.identities = Some(
                identities
                    .iter()
                    .map(|p| resolve_path(p, base_dir))
                    .collect(),
            );
        }
    }

    /// Whether any encryption key material is configured
    #[must_use]
    pub fn has_age(&self) -> bool {
        self.age.identity.is_some()
            || self.age.identities.as_ref().is_some_and(|v| !v.is_empty())
            || self.age.recipient.is_some()
            || !self.age.recipients.is_empty()
    }

    /// Parse the configured recipients, plus the identities' public keys when `derive` is set
    pub fn age_recipients(&self) -> Result<Vec<hearth_crypto::Recipient>> {
        let mut recipients = Vec::new();
        for text in self.age.recipient.iter().chain(&self.age.recipients) {
            let recipient = text.parse::<hearth_crypto::Recipient>().map_err(|e| {
                Error::Message(format!("Failed to parse recipient '{text}': {e}"))
            })?;
            recipients.push(recipient);
        }

        if self.age.derive {
            recipients.extend(
                self.age_identities()?
                    .iter()
                    .map(hearth_crypto::Identity::to_public),
            );
        }

        Ok(recipients)
    }

    /// Load all configured identities; empty when none are configured
    pub fn age_identities(&self) -> Result<Vec<hearth_crypto::Identity>> {
        let paths = self
            .age
            .identity
            .iter()
            .chain(self.age.identities.iter().flatten());

        let mut identities = Vec::new();
        for path in paths {
            let loaded = hearth_crypto::load_identities(path, is_ssh_identity(path)).map_err(
                |e| {
                    Error::Message(format!(
                        "Failed to load identity from {}: {e}",
                        path.display()
                    ))
                },
            )?;
            identities.extend(loaded);
        }
        Ok(identities)
    }
}

/// Expand `~` and resolve relative paths against `base_dir`
fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    let text = path.to_string_lossy();

    if let Some(stripped) = text.strip_prefix("~/") {
        if let Some(home) = ::dirs::home_dir() {
            return home.join(stripped);
        }
    } else if text == "~"
        && let Some(home) = ::dirs::home_dir()
    {
        return home;
    }

    if path.is_relative() {
        base_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

/// SSH private keys are recognized by living under a `.ssh` directory
#[must_use]
pub fn is_ssh_identity(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == ".ssh")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("", Path::new("/base")).unwrap();
        assert_eq!(config.general.encrypted_suffix, ".age");
        assert_eq!(config.add.secrets, SecretsMode::Warning);
        assert!(config.add.inherit);
        assert!(!config.add.encrypt);
        assert!(!config.apply.continue_on_script_error);
        assert!(!config.has_age());
    }

    #[test]
    fn test_sections_and_renames() {
        let toml = r#"
            [general]
            srcDir = "dotfiles"
            dstDir = "/home/me"
            workingTree = "work"
            encryptedSuffix = ".enc"

            [add]
            encrypt = true
            secrets = "error"
            templateSymlinks = true
            inherit = false

            [apply]
            continueOnScriptError = true

            [variables]
            email = "me@example.com"
        "#;
        let config = Config::from_toml_str(toml, Path::new("/base")).unwrap();
        assert_eq!(config.general.src_dir, Some(PathBuf::from("/base/dotfiles")));
        assert_eq!(config.general.dst_dir, Some(PathBuf::from("/home/me")));
        assert_eq!(config.general.working_tree, Some(PathBuf::from("/base/work")));
        assert_eq!(config.general.encrypted_suffix, ".enc");
        assert!(config.add.encrypt);
        assert_eq!(config.add.secrets, SecretsMode::Error);
        assert!(config.add.template_symlinks);
        assert!(!config.add.inherit);
        assert!(config.apply.continue_on_script_error);
        assert_eq!(config.variables["email"], serde_json::json!("me@example.com"));
    }

    #[test]
    fn test_empty_suffix_rejected() {
        let toml = "[general]\nencryptedSuffix = \"\"\n";
        assert!(Config::from_toml_str(toml, Path::new("/")).is_err());
    }

    #[test]
    fn test_invalid_secrets_mode() {
        let toml = "[add]\nsecrets = \"loud\"\n";
        assert!(Config::from_toml_str(toml, Path::new("/")).is_err());
        assert_eq!("WARN".parse::<SecretsMode>().unwrap(), SecretsMode::Warning);
        assert!("loud".parse::<SecretsMode>().is_err());
    }

    #[test]
    fn test_resolve_path_tilde() {
        if let Some(home) = ::dirs::home_dir() {
            assert_eq!(resolve_path(Path::new("~/x"), Path::new("/b")), home.join("x"));
            assert_eq!(resolve_path(Path::new("~"), Path::new("/b")), home);
        }
        assert_eq!(resolve_path(Path::new("/abs"), Path::new("/b")), PathBuf::from("/abs"));
    }

    #[test]
    fn test_is_ssh_identity() {
        assert!(is_ssh_identity(Path::new("/home/me/.ssh/id_ed25519")));
        assert!(!is_ssh_identity(Path::new("/home/me/.config/hearth/key.txt")));
        assert!(!is_ssh_identity(Path::new("/home/me/not.ssh/key")));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_or_default(temp.path().join("missing.toml")).unwrap();
        assert!(config.variables.is_empty());
    }

    #[test]
    fn test_age_recipient_parse_error() {
        let toml = "[age]\nrecipient = \"bogus\"\n";
        let config = Config::from_toml_str(toml, Path::new("/")).unwrap();
        assert!(config.has_age());
        assert!(config.age_recipients().is_err());
    }

    #[test]
    fn test_age_identities_empty_when_unconfigured() {
        let config = Config::default();
        assert!(config.age_identities().unwrap().is_empty());
        assert!(config.age_recipients().unwrap().is_empty());
    }
}
