//! Identity (private key) loading
//!
//! Two formats are accepted: age identity files (one `AGE-SECRET-KEY-1...`
//! per line, `#` comments allowed) and OpenSSH private keys with their
//! `.pub` file alongside.

use crate::{Error, Recipient, Result};
use age::x25519;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// An age identity (private key) for decryption
#[derive(Clone)]
pub enum Identity {
    /// Native age x25519 identity
    Age(x25519::Identity),
    /// SSH private key with its corresponding public key
    Ssh {
        /// Private key
        identity: age::ssh::Identity,
        /// Public key read from the `.pub` file
        recipient: Box<age::ssh::Recipient>,
    },
}

impl Identity {
    /// Generate a new random age identity
    pub fn generate() -> Self {
        Self::Age(x25519::Identity::generate())
    }

    /// Get the public key (recipient) for this identity
    pub fn to_public(&self) -> Recipient {
        match self {
            Self::Age(identity) => Recipient::Age(identity.to_public()),
            Self::Ssh { recipient, .. } => Recipient::Ssh((**recipient).clone()),
        }
    }

    pub(crate) fn as_dyn_identity(&self) -> &dyn age::Identity {
        match self {
            Self::Age(identity) => identity,
            Self::Ssh { identity, .. } => identity,
        }
    }
}

impl FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<x25519::Identity>()
            .map(Self::Age)
            .map_err(|e| Error::InvalidIdentity {
                reason: e.to_string(),
                path: "<string>".to_string(),
            })
    }
}

fn read_identity_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::IdentityNotFound {
                path: path.display().to_string(),
            }
        } else {
            Error::IdentityFile {
                path: path.display().to_string(),
                source: e,
            }
        }
    })
}

fn parse_age_identities(path: &Path, content: &str) -> Result<Vec<Identity>> {
    let mut identities = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match Identity::from_str(line) {
            Ok(identity) => identities.push(identity),
            Err(e) => warn!(
                "Skipping invalid identity on line {} in {}: {}",
                index + 1,
                path.display(),
                e
            ),
        }
    }

    if identities.is_empty() {
        return Err(Error::InvalidIdentity {
            reason: "no valid identities found".to_string(),
            path: path.display().to_string(),
        });
    }
    Ok(identities)
}

fn parse_ssh_identity(path: &Path, content: &[u8]) -> Result<Identity> {
    let invalid = |reason: String| Error::InvalidIdentity {
        reason,
        path: path.display().to_string(),
    };

    let identity = age::ssh::Identity::from_buffer(content, None)
        .map_err(|e| invalid(format!("failed to parse SSH key: {e}")))?;

    let pub_path = format!("{}.pub", path.display());
    let public = fs::read_to_string(&pub_path)
        .map_err(|_| invalid(format!("SSH public key not found: {pub_path}")))?;
    let recipient = age::ssh::Recipient::from_str(public.trim())
        .map_err(|e| invalid(format!("failed to parse SSH public key: {e:?}")))?;

    Ok(Identity::Ssh {
        identity,
        recipient: Box::new(recipient),
    })
}

/// Load identities from a file
///
/// * `is_ssh` - treat the file as an OpenSSH private key instead of an age identity file
pub fn load_identities<P: AsRef<Path>>(path: P, is_ssh: bool) -> Result<Vec<Identity>> {
    let path = path.as_ref();
    let content = read_identity_file(path)?;

    if is_ssh {
        return parse_ssh_identity(path, &content).map(|identity| vec![identity]);
    }

    let text = String::from_utf8(content).map_err(|_| Error::InvalidIdentity {
        reason: "identity file is not valid UTF-8".to_string(),
        path: path.display().to_string(),
    })?;
    parse_age_identities(path, &text)
}
