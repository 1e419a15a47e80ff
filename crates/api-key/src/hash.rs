//! SHA-256 hashing of key/secret pairs.

use sha2::{Digest, Sha256};

/// Separator placed between key and secret before hashing.
pub const HASH_SEPARATOR: char = ':';

/// Compute the stored hash for an API key: lowercase hex of
/// `SHA256(key ":" secret)`.
pub fn compute_hash(key: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update([HASH_SEPARATOR as u8]);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_output_size() {
        let hash = compute_hash("local_ABC", "SECRET");
        // SHA-256 produces 64 hex characters
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_matches_joined_input() {
        let mut hasher = Sha256::new();
        hasher.update(b"local_ABC:SECRET");
        assert_eq!(compute_hash("local_ABC", "SECRET"), hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(compute_hash("key", "secret"), compute_hash("key", "secret"));
    }

    #[test]
    fn test_hash_changes_with_secret() {
        assert_ne!(compute_hash("key", "secret1"), compute_hash("key", "secret2"));
    }

    #[test]
    fn test_hash_changes_with_key() {
        assert_ne!(compute_hash("key1", "secret"), compute_hash("key2", "secret"));
    }
}
