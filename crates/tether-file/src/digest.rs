//! Content fingerprints.

use sha2::{Digest, Sha256};

/// SHA-256 of the UTF-8 bytes of `text`, as 64 lowercase hex characters.
///
/// The digest is taken over decoded text, so the same contents stored in two different
/// encodings share a fingerprint.
pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(
            content_digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            content_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn deterministic_and_distinct() {
        assert_eq!(content_digest("hello"), content_digest("hello"));
        assert_ne!(content_digest("hello"), content_digest("hello "));
        assert_eq!(content_digest("hello").len(), 64);
    }
}
