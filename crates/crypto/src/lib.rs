//! # Hearth Crypto
//!
//! age-based implementation of [`hearth_core::EncryptionProvider`].
//!
//! Encrypted source files are written ASCII-armored so they stay diffable
//! in version control. Decryption accepts both armored and binary input.

pub mod age;
pub mod identity;
pub mod recipient;

pub use age::{decrypt, encrypt};
pub use identity::{Identity, load_identities};
pub use recipient::Recipient;

use thiserror::Error;

/// Default file name suffix for encrypted source files
pub const DEFAULT_ENCRYPTED_SUFFIX: &str = ".age";

/// Age encryption provider that implements the `EncryptionProvider` trait
pub struct AgeEncryption {
    recipients: Vec<Recipient>,
    identities: Vec<Identity>,
    suffix: String,
}

impl AgeEncryption {
    /// Create a new `AgeEncryption` instance with the given recipients and identities
    #[must_use]
    pub fn new(recipients: Vec<Recipient>, identities: Vec<Identity>) -> Self {
        Self {
            recipients,
            identities,
            suffix: DEFAULT_ENCRYPTED_SUFFIX.to_string(),
        }
    }

    /// Use a different suffix for encrypted source files
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }
}

impl hearth_core::EncryptionProvider for AgeEncryption {
    fn encrypt(&self, data: &[u8]) -> hearth_core::Result<Vec<u8>> {
        encrypt(data, &self.recipients).map_err(|e| hearth_core::Error::Encryption(e.to_string()))
    }

    fn decrypt(&self, data: &[u8]) -> hearth_core::Result<Vec<u8>> {
        decrypt(data, &self.identities).map_err(|e| hearth_core::Error::Encryption(e.to_string()))
    }

    fn encrypted_suffix(&self) -> &str {
        &self.suffix
    }
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crypto-related errors
#[derive(Error, Debug)]
pub enum Error {
    /// Age encryption/decryption error
    #[error("Age encryption error: {0}")]
    Age(String),

    /// No recipients provided for encryption
    #[error(
        "No recipients configured for encryption\n\
         \n\
         Add one to the [age] section of your config:\n\
         \n\
         [age]\n\
         recipient = \"age1...\""
    )]
    NoRecipients,

    /// No identity available for decryption
    #[error(
        "No identity available for decryption\n\
         \n\
         Configure one in the [age] section of your config:\n\
         \n\
         [age]\n\
         identity = \"~/.config/hearth/key.txt\""
    )]
    NoIdentity,

    /// Identity file not found
    #[error("Identity file not found: {path}")]
    IdentityNotFound {
        /// Path to the identity file that was not found
        path: String,
    },

    /// Identity file could not be read
    #[error("Failed to read identity file {path}: {source}")]
    IdentityFile {
        /// Path to the identity file
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Invalid identity format or content
    #[error("Invalid identity in {path}: {reason}")]
    InvalidIdentity {
        /// Reason for the invalid identity
        reason: String,
        /// Path to the identity file
        path: String,
    },

    /// Invalid recipient format
    #[error("Invalid recipient '{recipient}': {reason}")]
    InvalidRecipient {
        /// Invalid recipient string
        recipient: String,
        /// Reason for the invalid recipient
        reason: String,
    },

    /// Decryption failed due to wrong key
    #[error("Decryption failed - wrong key or corrupted data")]
    WrongKey,

    /// Decryption failed for other reasons
    #[error("Decryption failed: {reason}")]
    DecryptionFailed {
        /// Reason for decryption failure
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
