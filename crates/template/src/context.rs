//! Template context management
//!
//! The context is the data map templates render against.

use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

/// Builtin values exposed as `hearth.*`
#[derive(Debug, Clone, Serialize)]
pub struct HearthInfo {
    /// Source directory
    pub source_dir: String,
    /// Destination directory
    pub dest_dir: String,
    /// Operating system (e.g. "linux", "macos")
    pub os: String,
    /// Architecture (e.g. "x86_64")
    pub arch: String,
}

/// Context data available to templates
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    /// Builtin values
    pub hearth: HearthInfo,

    /// User-defined variables, flattened so templates write `{{ email }}`
    #[serde(flatten)]
    pub variables: IndexMap<String, serde_json::Value>,
}

impl TemplateContext {
    /// Create a context for the given source and destination directories
    #[must_use]
    pub fn new(source_dir: &Path, dest_dir: &Path) -> Self {
        Self {
            hearth: HearthInfo {
                source_dir: source_dir.display().to_string(),
                dest_dir: dest_dir.display().to_string(),
                os: crate::functions::os().to_string(),
                arch: crate::functions::arch().to_string(),
            },
            variables: IndexMap::new(),
        }
    }

    /// Add user variables
    ///
    /// A variable named `hearth` is dropped so the builtins cannot be shadowed.
    #[must_use]
    pub fn with_variables(mut self, variables: &IndexMap<String, serde_json::Value>) -> Self {
        self.variables = variables
            .iter()
            .filter(|(key, _)| key.as_str() != "hearth")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self
    }

    /// Convert to the JSON value handed to renderers
    pub fn to_value(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_value_layout() {
        let mut vars = IndexMap::new();
        vars.insert("email".to_string(), json!("me@example.com"));
        vars.insert("hearth".to_string(), json!("shadow"));

        let value = TemplateContext::new(Path::new("/src"), Path::new("/home/me"))
            .with_variables(&vars)
            .to_value()
            .unwrap();

        assert_eq!(value["email"], json!("me@example.com"));
        assert_eq!(value["hearth"]["source_dir"], json!("/src"));
        assert_eq!(value["hearth"]["dest_dir"], json!("/home/me"));
        assert!(value["hearth"]["os"].is_string());
    }
}
