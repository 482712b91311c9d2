//! Text fingerprinting
//!
//! Scan results and telemetry identify inputs by SHA-256 fingerprint only,
//! never by content. The short form keys the embedding cache.

use sha2::{Digest, Sha256};

/// Full SHA-256 hex digest of the text (64 characters)
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// First 16 hex characters of the digest, used as a cache key component
pub fn short_fingerprint(text: &str) -> String {
    let mut full = fingerprint(text);
    full.truncate(16);
    full
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(fingerprint("hello"), fingerprint("hello"));
        assert_ne!(fingerprint("hello"), fingerprint("hello "));
    }

    #[test]
    fn test_fingerprint_known_value() {
        // SHA-256 of the empty string
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_short_fingerprint_is_prefix() {
        let full = fingerprint("some prompt");
        let short = short_fingerprint("some prompt");
        assert_eq!(short.len(), 16);
        assert!(full.starts_with(&short));
    }
}
