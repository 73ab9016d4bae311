//! Cryptographic utilities for enrollment key generation and hashing.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Alphabet used for generated keys. Alphanumeric only so keys survive
/// copy-paste, QR codes and URL query strings unescaped.
const KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of enrollment keys handed to the office on device creation.
pub const ENROLLMENT_KEY_LENGTH: usize = 64;

/// Generates a random alphanumeric key of the given length using the
/// thread-local CSPRNG.
pub fn random_key(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..KEY_ALPHABET.len());
            KEY_ALPHABET[idx] as char
        })
        .collect()
}

/// Computes SHA-256 hash of the input and returns it as a hex string.
///
/// Enrollment keys are stored hashed; the plaintext key is returned to the
/// office exactly once at creation time.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_key_length() {
        assert_eq!(random_key(64).len(), 64);
        assert_eq!(random_key(10).len(), 10);
        assert_eq!(random_key(0).len(), 0);
    }

    #[test]
    fn test_random_key_alphabet() {
        let key = random_key(256);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_key_unique() {
        // Collision over 64 chars is practically impossible.
        assert_ne!(random_key(64), random_key(64));
    }

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_sha256_hex_deterministic() {
        assert_eq!(sha256_hex("same_input"), sha256_hex("same_input"));
        assert_ne!(sha256_hex("input1"), sha256_hex("input2"));
    }
}
