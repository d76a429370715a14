//! ID and secret generation utilities.

use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use ulid::Ulid;

/// ID generator for entities and one-time secrets.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are lexicographically sortable, so ordering by ID follows creation order
    /// across milliseconds.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate `bytes` bytes from the operating system RNG, rendered as lowercase hex.
    #[must_use]
    pub fn generate_secret(&self, bytes: usize) -> String {
        let mut buf = vec![0u8; bytes];
        OsRng.fill_bytes(&mut buf);
        hex::encode(buf)
    }
}

/// SHA-256 digest of a secret, rendered as lowercase hex.
///
/// Used for values that are looked up by equality (reset tokens) and therefore
/// cannot use a salted password hash.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_eq!(id2.len(), 26);
        assert_ne!(id1, id2);
        assert_eq!(id1, id1.to_lowercase());
    }

    #[test]
    fn test_generate_secret_length_and_charset() {
        let id_gen = IdGenerator::new();
        let secret = id_gen.generate_secret(16);

        assert_eq!(secret.len(), 32);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, id_gen.generate_secret(16));
    }

    #[test]
    fn test_hash_secret_is_stable() {
        let digest = hash_secret("token");

        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_secret("token"));
        assert_ne!(digest, hash_secret("other"));
    }
}
