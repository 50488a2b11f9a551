//! Content processing for decryption, encryption and template rendering
//!
//! Source content becomes target content by decrypting first and rendering
//! second, so an encrypted template is an encrypted file whose plaintext is
//! a template. Capture goes the other way and only ever encrypts.

use crate::attr::Attr;
use crate::error::{Error, Result};
use hearth_core::{EncryptionProvider, TemplateRenderer};

/// Encryption provider used when no encryption is configured
///
/// Every operation fails, so an encrypted source entry reports a clear
/// error instead of being written as ciphertext.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEncryption;

impl EncryptionProvider for NoEncryption {
    fn encrypt(&self, _data: &[u8]) -> hearth_core::Result<Vec<u8>> {
        Err(hearth_core::Error::Encryption(
            "no encryption recipients configured".to_string(),
        ))
    }

    fn decrypt(&self, _data: &[u8]) -> hearth_core::Result<Vec<u8>> {
        Err(hearth_core::Error::Encryption(
            "no decryption identities configured".to_string(),
        ))
    }
}

/// Content processor with pluggable encryption and rendering
pub struct ContentProcessor {
    encryption: Box<dyn EncryptionProvider>,
    renderer: Box<dyn TemplateRenderer>,
    context: serde_json::Value,
}

impl ContentProcessor {
    /// Create a processor rendering templates against `context`
    pub fn new(
        encryption: Box<dyn EncryptionProvider>,
        renderer: Box<dyn TemplateRenderer>,
        context: serde_json::Value,
    ) -> Self {
        Self {
            encryption,
            renderer,
            context,
        }
    }

    /// Template data
    pub fn context(&self) -> &serde_json::Value {
        &self.context
    }

    /// Suffix carried by encrypted source files
    pub fn encrypted_suffix(&self) -> &str {
        self.encryption.encrypted_suffix()
    }

    /// Encrypt `content` destined for `path`
    pub fn encrypt(&self, path: &str, content: &[u8]) -> Result<Vec<u8>> {
        self.encryption
            .encrypt(content)
            .map_err(|e| Error::Encryption {
                path: path.to_string(),
                message: e.to_string(),
            })
    }

    /// Decrypt `content` read from `path`
    pub fn decrypt(&self, path: &str, content: &[u8]) -> Result<Vec<u8>> {
        self.encryption
            .decrypt(content)
            .map_err(|e| Error::Decryption {
                path: path.to_string(),
                message: e.to_string(),
            })
    }

    /// Render `content` as a template named `path`
    pub fn render(&self, path: &str, content: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(content).map_err(|e| Error::InvalidUtf8 {
            path: path.to_string(),
            source: e,
        })?;
        self.renderer
            .render_named_str(path, text, &self.context)
            .map(String::into_bytes)
            .map_err(|e| Error::TemplateRender {
                path: path.to_string(),
                message: e.to_string(),
            })
    }

    /// Turn source bytes into target bytes according to `attr`
    pub fn process(&self, path: &str, attr: Attr, content: &[u8]) -> Result<Vec<u8>> {
        let decrypted = if attr.is_encrypted() {
            self.decrypt(path, content)?
        } else {
            content.to_vec()
        };
        if attr.is_template() {
            self.render(path, &decrypted)
        } else {
            Ok(decrypted)
        }
    }
}
