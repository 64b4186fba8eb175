//! Content fingerprinting.
//!
//! The fingerprint is the deduplication key: SHA-256 over `title` followed
//! by `content`, lowercase hex. URL, metadata and timestamps are excluded so
//! the same page reached through different URLs collapses to one record.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded SHA-256 fingerprint of a record's title and content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the fingerprint for a `(title, content)` pair.
    #[must_use]
    pub fn compute(title: &str, content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(content.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already computed hex digest (e.g. read back from storage).
    #[must_use]
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Get the hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no digest has been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_input_same_hash() {
        let first = ContentHash::compute("Test Page", "<html><body>Test content</body></html>");
        for _ in 0..10 {
            let again =
                ContentHash::compute("Test Page", "<html><body>Test content</body></html>");
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_known_digest() {
        // sha256("abc")
        let hash = ContentHash::compute("a", "bc");
        assert_eq!(
            hash.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_different_content_different_hash() {
        let a = ContentHash::compute("Title", "one");
        let b = ContentHash::compute("Title", "two");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_shape() {
        let hash = ContentHash::compute("", "");
        assert_eq!(hash.as_str().len(), 64);
        assert!(hash
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert!(!hash.is_empty());
    }
}
