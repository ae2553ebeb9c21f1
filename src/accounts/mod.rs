//! Local accounts, credentials and secret hashing
//!
//! The handshake never talks to a database directly. It goes through the
//! traits below so deployments can back them with whatever user store they
//! already have; the in-memory implementations serve the binary and tests.

pub mod hasher;
pub mod memory;
pub mod resolver;

pub use hasher::Argon2SecretHasher;
pub use memory::{InMemoryCredentialStore, InMemoryUserDirectory};
pub use resolver::{AccountPolicy, AccountResolver};

use crate::models::DirectoryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A user of this service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAccount {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub quota: i64,
    /// Output of the configured [`SecretHasher`]
    #[serde(skip_serializing)]
    pub hashed_secret: String,
}

/// Fields of an account about to be created; the directory assigns the id
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub quota: i64,
    pub hashed_secret: String,
}

/// API credential handed out to a completed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    pub secret: String,
    pub name: String,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// # Errors
    /// Returns `Backend` if the store cannot be queried
    async fn find_by_email(&self, email: &str) -> Result<Option<LocalAccount>, DirectoryError>;

    /// # Errors
    /// Returns `Backend` if the store cannot be queried
    async fn find_by_username(&self, username: &str)
        -> Result<Option<LocalAccount>, DirectoryError>;

    /// # Errors
    /// Returns `Conflict` if the username is taken
    async fn create_user(&self, account: NewAccount) -> Result<LocalAccount, DirectoryError>;

    /// Persist changed profile fields of an existing account
    ///
    /// # Errors
    /// Returns `Backend` if the account does not exist or cannot be written
    async fn update_user(&self, account: &LocalAccount) -> Result<(), DirectoryError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Return the user's default credential, creating it on first use
    ///
    /// An existing credential is renamed when `name` differs; its secret is kept.
    ///
    /// # Errors
    /// Returns `Backend` if the user id is invalid or the store fails
    async fn get_or_create_default_credential(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<IssuedCredential, DirectoryError>;
}

pub trait SecretHasher: Send + Sync {
    /// # Errors
    /// Returns `Hashing` if the secret cannot be hashed
    fn hash(&self, secret: &str) -> Result<String, DirectoryError>;

    /// Constant-time comparison of `secret` against a stored hash
    fn verify(&self, secret: &str, hashed: &str) -> bool;
}
