//! Recipient (public key) types for age encryption

use age::{ssh, x25519};
use std::fmt;
use std::str::FromStr;

/// A recipient for age encryption, either a native age key or an SSH key
#[derive(Clone)]
pub enum Recipient {
    /// Native age x25519 recipient
    Age(x25519::Recipient),
    /// SSH public key recipient
    Ssh(ssh::Recipient),
}

impl Recipient {
    /// Convert to a boxed trait object for use with age encryption
    #[must_use]
    pub fn to_boxed(&self) -> Box<dyn age::Recipient + Send> {
        match self {
            Self::Age(r) => Box::new(r.clone()),
            Self::Ssh(r) => Box::new(r.clone()),
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Age(r) => write!(f, "{r}"),
            Self::Ssh(r) => write!(f, "{r}"),
        }
    }
}

impl FromStr for Recipient {
    type Err = crate::Error;

    /// Parse `age1...` first, then `ssh-...`
    fn from_str(s: &str) -> crate::Result<Self> {
        let s = s.trim();
        if let Ok(recipient) = s.parse::<x25519::Recipient>() {
            return Ok(Self::Age(recipient));
        }
        if let Ok(recipient) = s.parse::<ssh::Recipient>() {
            return Ok(Self::Ssh(recipient));
        }
        Err(crate::Error::InvalidRecipient {
            recipient: s.to_string(),
            reason: "expected age1... or ssh-... format".to_string(),
        })
    }
}
