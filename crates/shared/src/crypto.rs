//! Hashing and token generation for one-time secrets.
//!
//! Session ids, password reset tokens and email verification tokens are
//! stored only as SHA-256 digests; the plaintext leaves the server once.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes in a one-time token (hex encoding doubles it).
pub const SECURE_TOKEN_BYTES: usize = 32;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates a random one-time token, hex encoded.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; SECURE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_sha256_hex_empty_string() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hex_different_inputs() {
        assert_ne!(sha256_hex("input1"), sha256_hex("input2"));
    }

    #[test]
    fn test_generate_secure_token_length() {
        let token = generate_secure_token();
        assert_eq!(token.len(), SECURE_TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_secure_token_unique() {
        assert_ne!(generate_secure_token(), generate_secure_token());
    }

    #[test]
    fn test_token_hash_is_not_token() {
        let token = generate_secure_token();
        assert_ne!(sha256_hex(&token), token);
    }
}
