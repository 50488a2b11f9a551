//! Collaborator traits for hearth components
//!
//! The reconciliation engine treats encryption and templating as opaque
//! services. These traits are the seams: `hearth-crypto` and
//! `hearth-template` implement them, tests substitute fakes.

use crate::Result;

/// Template expression that renders to the source directory.
pub const SOURCE_DIR_EXPR: &str = "{{ hearth.source_dir }}";

/// Template expression that renders to the destination directory.
pub const DEST_DIR_EXPR: &str = "{{ hearth.dest_dir }}";

/// Encryption provider interface
///
/// Abstracts encryption/decryption so the engine never depends on a
/// particular backend.
///
/// # Examples
///
/// ```ignore
/// fn encrypt_secret(provider: &dyn EncryptionProvider, secret: &str) -> Result<Vec<u8>> {
///     provider.encrypt(secret.as_bytes())
/// }
/// ```
pub trait EncryptionProvider {
    /// Encrypt data
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt data
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// File name suffix marking encrypted source files
    fn encrypted_suffix(&self) -> &str {
        ".age"
    }
}

/// Template renderer interface
///
/// Uses `serde_json::Value` for the data context so the trait stays object
/// safe. Every context handed to a renderer carries a `hearth` object with
/// `source_dir`, `dest_dir`, `os` and `arch`.
///
/// # Examples
///
/// ```ignore
/// let context = serde_json::json!({"username": "Alice"});
/// let result = renderer.render_str("Hello {{ username }}!", &context)?;
/// ```
pub trait TemplateRenderer {
    /// Render a template string with the given context
    fn render_str(&self, template: &str, context: &serde_json::Value) -> Result<String>;

    /// Render a template string with a specific name for better error messages
    ///
    /// # Arguments
    ///
    /// * `name` - Template name to use in error messages (e.g., file path)
    /// * `template` - The template source code
    /// * `context` - Context data as a JSON value
    fn render_named_str(
        &self,
        name: &str,
        template: &str,
        context: &serde_json::Value,
    ) -> Result<String>;
}
