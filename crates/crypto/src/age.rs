//! Age encryption and decryption
//!
//! Output is always ASCII armor; input may be armored or binary.

use crate::identity::Identity;
use crate::{Error, Recipient, Result};
use std::io::{Read, Write};

fn age_error<E: std::fmt::Display>(e: E) -> Error {
    Error::Age(e.to_string())
}

fn map_decrypt_error(e: age::DecryptError) -> Error {
    match e {
        age::DecryptError::NoMatchingKeys
        | age::DecryptError::InvalidMac
        | age::DecryptError::KeyDecryptionFailed => Error::WrongKey,
        age::DecryptError::InvalidHeader => Error::DecryptionFailed {
            reason: "invalid age header".to_string(),
        },
        age::DecryptError::UnknownFormat => Error::DecryptionFailed {
            reason: "unknown age format".to_string(),
        },
        age::DecryptError::Io(io_err) => Error::Io(io_err),
        other => Error::DecryptionFailed {
            reason: other.to_string(),
        },
    }
}

/// Encrypt data for the given recipients in ASCII armor format.
///
/// # Errors
///
/// - [`Error::NoRecipients`] if `recipients` is empty
/// - [`Error::Age`] if encryption fails
///
/// # Examples
///
/// ```no_run
/// use hearth_crypto::{decrypt, encrypt, Identity};
///
/// let identity = Identity::generate();
/// let encrypted = encrypt(b"secret", &[identity.to_public()]).unwrap();
/// assert_eq!(decrypt(&encrypted, &[identity]).unwrap(), b"secret");
/// ```
pub fn encrypt(data: &[u8], recipients: &[Recipient]) -> Result<Vec<u8>> {
    if recipients.is_empty() {
        return Err(Error::NoRecipients);
    }

    let boxed: Vec<Box<dyn age::Recipient + Send>> =
        recipients.iter().map(Recipient::to_boxed).collect();
    let encryptor = age::Encryptor::with_recipients(
        boxed.iter().map(|r| r.as_ref() as &dyn age::Recipient),
    )
    .map_err(age_error)?;

    let mut encrypted = Vec::new();
    let armor =
        age::armor::ArmoredWriter::wrap_output(&mut encrypted, age::armor::Format::AsciiArmor)
            .map_err(age_error)?;
    let mut writer = encryptor.wrap_output(armor).map_err(age_error)?;
    writer.write_all(data).map_err(age_error)?;
    writer
        .finish()
        .and_then(age::armor::ArmoredWriter::finish)
        .map_err(age_error)?;

    Ok(encrypted)
}

/// Decrypt armored or binary age data with any of the given identities.
///
/// # Errors
///
/// - [`Error::NoIdentity`] if `identities` is empty
/// - [`Error::WrongKey`] if none of the identities match
pub fn decrypt(data: &[u8], identities: &[Identity]) -> Result<Vec<u8>> {
    if identities.is_empty() {
        return Err(Error::NoIdentity);
    }

    let keys: Vec<&dyn age::Identity> = identities.iter().map(Identity::as_dyn_identity).collect();

    // ArmoredReader passes binary input through unchanged
    let decryptor =
        age::Decryptor::new(age::armor::ArmoredReader::new(data)).map_err(map_decrypt_error)?;
    let mut reader = decryptor
        .decrypt(keys.iter().copied())
        .map_err(map_decrypt_error)?;

    let mut decrypted = Vec::new();
    reader.read_to_end(&mut decrypted).map_err(age_error)?;
    Ok(decrypted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_encrypt_is_armored() {
        let identity = Identity::generate();
        let encrypted = encrypt(b"hello", &[identity.to_public()]).unwrap();
        let text = String::from_utf8(encrypted).unwrap();
        assert!(text.starts_with("-----BEGIN AGE ENCRYPTED FILE-----"));
        assert!(text.trim_end().ends_with("-----END AGE ENCRYPTED FILE-----"));
    }

    #[test]
    fn test_decrypt_with_any_matching_identity() {
        let first = Identity::generate();
        let second = Identity::generate();
        let encrypted = encrypt(b"shared", &[second.to_public()]).unwrap();

        let decrypted = decrypt(&encrypted, &[first, second]).unwrap();
        assert_eq!(decrypted, b"shared");
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let encrypted = encrypt(b"x", &[Identity::generate().to_public()]).unwrap();
        let err = decrypt(&encrypted, &[Identity::generate()]).unwrap_err();
        assert!(matches!(err, Error::WrongKey));
    }

    #[test]
    fn test_decrypt_requires_identity() {
        assert!(matches!(decrypt(b"anything", &[]), Err(Error::NoIdentity)));
    }

    #[test]
    fn test_encrypt_empty_content() {
        let identity = Identity::generate();
        let encrypted = encrypt(b"", &[identity.to_public()]).unwrap();
        assert!(decrypt(&encrypted, &[identity]).unwrap().is_empty());
    }
}
