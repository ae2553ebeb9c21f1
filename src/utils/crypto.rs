// Cryptographic utilities for secrets, keyed digests and identifiers

use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use rand::distr::Alphanumeric;
use rand::{Rng, RngCore};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of minted API credential secrets
pub const CREDENTIAL_SECRET_LENGTH: usize = 48;

/// Generate a random alphanumeric API credential secret
///
/// 48 characters drawn from `[A-Za-z0-9]`, roughly 285 bits of entropy.
#[must_use]
pub fn generate_credential_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CREDENTIAL_SECRET_LENGTH)
        .map(char::from)
        .collect()
}

/// Generate a cryptographically secure random key, base64 encoded
///
/// Generates 32 bytes (256 bits) of entropy
#[must_use]
pub fn generate_random_key() -> String {
    let mut key = [0u8; 32];
    rand::rng().fill_bytes(&mut key);
    general_purpose::STANDARD.encode(key)
}

/// HMAC-SHA256 of `message` under `key`
///
/// HMAC accepts keys of any length, so this cannot fail.
#[must_use]
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(key);
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Derive an opaque, deterministic secret from `material` under `key`
///
/// Used for generated passwords of accounts created from an external
/// identity: reproducible by the service, unguessable without the key.
#[must_use]
pub fn derive_keyed_secret(key: &[u8], material: &str) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(hmac_sha256(key, material.as_bytes()))
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    match <HmacSha256 as Mac>::new_from_slice(key) {
        Ok(mac) => mac,
        // HMAC is defined for every key length
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any length"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &[u8] = b"test_secret_key_for_hmac_testing_32b";

    #[test]
    fn test_credential_secret_shape() {
        let secret = generate_credential_secret();
        assert_eq!(secret.len(), CREDENTIAL_SECRET_LENGTH);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(secret, generate_credential_secret());
    }

    #[test]
    fn test_random_key_is_32_bytes() {
        let key = generate_random_key();
        let decoded = general_purpose::STANDARD.decode(&key).unwrap();
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn test_hmac_sha256_deterministic() {
        let sig1 = hmac_sha256(TEST_KEY, b"test.message");
        let sig2 = hmac_sha256(TEST_KEY, b"test.message");
        assert_eq!(sig1, sig2, "HMAC signatures should be deterministic");
        assert_eq!(sig1.len(), 32);
        assert_ne!(sig1, hmac_sha256(TEST_KEY, b"other.message"));
    }

    #[test]
    fn test_empty_key_is_accepted() {
        assert_eq!(hmac_sha256(b"", b"message").len(), 32);
    }

    #[test]
    fn test_derived_secret_depends_on_key_and_material() {
        let a = derive_keyed_secret(TEST_KEY, "external:coder:123");
        assert_eq!(a, derive_keyed_secret(TEST_KEY, "external:coder:123"));
        assert_ne!(a, derive_keyed_secret(TEST_KEY, "external:coder:124"));
        assert_ne!(a, derive_keyed_secret(b"another key", "external:coder:123"));
    }
}
