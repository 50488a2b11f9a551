//! Functions and filters registered with the template environment

use minijinja::Value;
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;

/// Get an environment variable, empty when unset
///
/// Usage: `{{ env("EDITOR") }}`
pub fn env(name: &str) -> Cow<'static, str> {
    env::var(name).map_or(Cow::Borrowed(""), Cow::Owned)
}

/// Get the operating system name
///
/// Usage: `{{ os() }}`
#[must_use]
pub fn os() -> &'static str {
    env::consts::OS
}

/// Get the system architecture
///
/// Usage: `{{ arch() }}`
#[must_use]
pub fn arch() -> &'static str {
    env::consts::ARCH
}

/// Join path components
///
/// Usage: `{{ joinPath(hearth.dest_dir, ".config") }}`
#[must_use]
pub fn join_path(args: &[Value]) -> String {
    let mut path = PathBuf::new();
    for arg in args {
        if let Some(s) = arg.as_str() {
            path.push(s);
        }
    }
    path.to_string_lossy().into_owned()
}

/// Wrap a string in double quotes, escaping `"` and `\`
///
/// Usage: `{{ name | quote }}`
#[must_use]
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Serialize a value as JSON
///
/// Usage: `{{ data | toJson }}`
pub fn to_json(value: &Value) -> Result<String, minijinja::Error> {
    serde_json::to_string(value)
        .map_err(|e| minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, e.to_string()))
}

/// Parse a JSON string
///
/// Usage: `{{ (text | fromJson).key }}`
pub fn from_json(value: &str) -> Result<Value, minijinja::Error> {
    serde_json::from_str::<serde_json::Value>(value)
        .map(Value::from_serialize)
        .map_err(|e| minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, e.to_string()))
}
