use super::SecretHasher;
use crate::models::DirectoryError;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

/// Salt length in bytes
const SALT_LENGTH: usize = 16;

/// Salted Argon2id secret hasher, peppered with the configured account key
///
/// Stored form is the PHC string (`$argon2id$v=19$...`), so cost parameters
/// travel with each hash and can be raised without invalidating old ones.
#[derive(Clone)]
pub struct Argon2SecretHasher {
    pepper: Vec<u8>,
    params: Params,
}

impl Argon2SecretHasher {
    /// Hasher with the default Argon2id cost parameters
    #[must_use]
    pub fn new(pepper: impl Into<Vec<u8>>) -> Self {
        Self::with_params(pepper, Params::default())
    }

    #[must_use]
    pub fn with_params(pepper: impl Into<Vec<u8>>, params: Params) -> Self {
        Self {
            pepper: pepper.into(),
            params,
        }
    }

    fn argon2(&self) -> Result<Argon2<'_>, DirectoryError> {
        if self.pepper.is_empty() {
            return Ok(Argon2::new(
                Algorithm::Argon2id,
                Version::V0x13,
                self.params.clone(),
            ));
        }
        Argon2::new_with_secret(
            &self.pepper,
            Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
        .map_err(|e| DirectoryError::Hashing(e.to_string()))
    }
}

impl SecretHasher for Argon2SecretHasher {
    fn hash(&self, secret: &str) -> Result<String, DirectoryError> {
        if secret.is_empty() {
            return Err(DirectoryError::Hashing("secret is empty".to_string()));
        }

        let mut salt_bytes = [0u8; SALT_LENGTH];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| DirectoryError::Hashing(e.to_string()))?;

        let hashed = self
            .argon2()?
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| DirectoryError::Hashing(e.to_string()))?;
        Ok(hashed.to_string())
    }

    fn verify(&self, secret: &str, hashed: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hashed) else {
            return false;
        };
        self.argon2()
            .is_ok_and(|argon2| argon2.verify_password(secret.as_bytes(), &parsed).is_ok())
    }
}
