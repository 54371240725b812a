//! Hashing utilities for plan ids, event ids and analysis fingerprints

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Compute SHA256 hash of data
pub fn hash_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash any serializable object
pub fn hash_object<T: Serialize>(obj: &T) -> Result<String> {
    let json = serde_json::to_vec(obj)?;
    Ok(hash_sha256(&json))
}

/// First `len` hex characters of the SHA256 of `data`
pub fn short_hash(data: &[u8], len: usize) -> String {
    let mut digest = hash_sha256(data);
    digest.truncate(len);
    digest
}

/// First `len` hex characters of the SHA256 of a serializable object
pub fn short_hash_object<T: Serialize>(obj: &T, len: usize) -> Result<String> {
    let mut digest = hash_object(obj)?;
    digest.truncate(len);
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_sha256() {
        let data = b"test data";
        let hash = hash_sha256(data);
        assert_eq!(hash.len(), 64); // 32 bytes = 64 hex chars

        // Same input should produce same output
        assert_eq!(hash, hash_sha256(data));
    }

    #[test]
    fn test_short_hash_is_prefix() {
        let full = hash_sha256(b"gitsplits");
        let short = short_hash(b"gitsplits", 10);
        assert_eq!(short.len(), 10);
        assert!(full.starts_with(&short));
    }

    #[test]
    fn test_short_hash_object_is_stable() {
        #[derive(Serialize)]
        struct Seed {
            intent: &'static str,
            now: i64,
        }

        let a = short_hash_object(&Seed { intent: "pay", now: 1 }, 16).unwrap();
        let b = short_hash_object(&Seed { intent: "pay", now: 1 }, 16).unwrap();
        let c = short_hash_object(&Seed { intent: "pay", now: 2 }, 16).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
