//! Salted password hashing for `utilisateurs`
//!
//! Stored format: `sha256$<salt hex>$<digest hex>` where the digest is
//! SHA-256 over the salt followed by the password bytes.

use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const SCHEME: &str = "sha256";
const SALT_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("password must not be empty")]
    Empty,

    #[error("stored password hash is malformed")]
    Malformed,
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Random salt, hex-encoded
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

/// Hex SHA-256 of `salt || password`
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a password with a fresh salt into the stored format
pub fn encode_password(password: &str) -> Result<String, PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::Empty);
    }
    let salt = generate_salt();
    Ok(format!("{}${}${}", SCHEME, salt, hash_password(password, &salt)))
}

fn split_encoded(encoded: &str) -> Result<(&str, &str), PasswordError> {
    let mut parts = encoded.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(SCHEME), Some(salt), Some(digest)) if !salt.is_empty() && digest.len() == 64 => {
            Ok((salt, digest))
        }
        _ => Err(PasswordError::Malformed),
    }
}

/// Check a password against its stored form
pub fn verify_password(password: &str, encoded: &str) -> Result<bool, PasswordError> {
    let (salt, digest) = split_encoded(encoded)?;
    let candidate = hash_password(password, salt);
    // Compare every byte so timing does not depend on the mismatch position
    let same = candidate.len() == digest.len()
        && candidate
            .bytes()
            .zip(digest.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0;
    Ok(same)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_then_verify() {
        let stored = encode_password("s3cret").unwrap();
        assert!(stored.starts_with("sha256$"));
        assert!(verify_password("s3cret", &stored).unwrap());
        assert!(!verify_password("S3cret", &stored).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let a = encode_password("same").unwrap();
        let b = encode_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_known_digest() {
        // echo -n "saltpassword" | sha256sum
        assert_eq!(
            hash_password("password", "salt"),
            "13601bda4ea78e55a07b98866d2be6be0744e3866f13c00c811cab608a28f322"
        );
    }

    #[test]
    fn test_malformed_and_empty() {
        assert_eq!(encode_password(""), Err(PasswordError::Empty));
        assert_eq!(verify_password("x", "plain"), Err(PasswordError::Malformed));
        assert_eq!(verify_password("x", "md5$ab$cd"), Err(PasswordError::Malformed));
    }
}
