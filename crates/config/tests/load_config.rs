//! Integration tests for loading configuration files from disk

#![allow(clippy::unwrap_used, clippy::panic)]

use hearth_config::{Config, SecretsMode};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_resolves_relative_to_config_file() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
[general]
srcDir = "./source"

[age]
identities = ["keys/a.txt", "/abs/b.txt"]

[add]
secrets = "ignore"
"#,
    )
    .unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.general.src_dir, Some(temp.path().join("source")));
    assert_eq!(
        config.age.identities,
        Some(vec![temp.path().join("keys/a.txt"), "/abs/b.txt".into()])
    );
    assert_eq!(config.add.secrets, SecretsMode::Ignore);
}

#[test]
fn test_load_reports_path_on_parse_error() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");
    fs::write(&config_path, "[general\n").unwrap();

    let err = Config::load(&config_path).unwrap_err();
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn test_missing_identity_file_is_error() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");
    fs::write(&config_path, "[age]\nidentity = \"missing.txt\"\nderive = true\n").unwrap();

    let config = Config::load(&config_path).unwrap();
    assert!(config.age_identities().is_err());
    assert!(config.age_recipients().is_err());
}
