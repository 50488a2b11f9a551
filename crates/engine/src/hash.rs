//! Content hashing using blake3
//!
//! Hashes are what the persistent state records for entries and scripts,
//! so they only need to be stable and collision resistant.

/// Hash content using blake3
///
/// # Examples
///
/// ```
/// use hearth_engine::hash::hash_content;
///
/// let hash = hash_content(b"Hello, world!");
/// assert_eq!(hash.len(), 32);
/// ```
#[must_use]
pub fn hash_content(content: &[u8]) -> [u8; 32] {
    *blake3::hash(content).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_content_deterministic() {
        assert_eq!(hash_content(b"abc"), hash_content(b"abc"));
        assert_ne!(hash_content(b"abc"), hash_content(b"abd"));
    }

    #[test]
    fn test_hash_content_empty() {
        let hash = hash_content(b"");
        assert!(!hash.iter().all(|&b| b == 0));
    }
}
