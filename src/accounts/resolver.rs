//! Mapping verified identities onto local accounts

use super::{LocalAccount, NewAccount, SecretHasher, UserDirectory};
use crate::models::{DirectoryError, ExternalIdentity};
use crate::settings::AccountSettings;
use crate::utils::crypto::derive_keyed_secret;
use log::{debug, info};
use std::sync::Arc;

/// Defaults applied to accounts created on first sign-in
#[derive(Debug, Clone)]
pub struct AccountPolicy {
    pub default_role: String,
    pub default_quota: i64,
    /// Keys the derivation of generated secrets for external accounts
    pub secret_pepper: Vec<u8>,
}

impl AccountPolicy {
    #[must_use]
    pub fn from_settings(settings: &AccountSettings) -> Self {
        Self {
            default_role: settings.default_role.clone(),
            default_quota: settings.default_quota,
            secret_pepper: settings.secret_pepper.as_bytes().to_vec(),
        }
    }
}

pub struct AccountResolver {
    directory: Arc<dyn UserDirectory + Send + Sync>,
    hasher: Arc<dyn SecretHasher + Send + Sync>,
    policy: AccountPolicy,
}

impl AccountResolver {
    #[must_use]
    pub fn new(
        directory: Arc<dyn UserDirectory + Send + Sync>,
        hasher: Arc<dyn SecretHasher + Send + Sync>,
        policy: AccountPolicy,
    ) -> Self {
        Self {
            directory,
            hasher,
            policy,
        }
    }

    /// Find or create the local account for an external identity
    ///
    /// Matches on non-empty email first, then on username; profile fields
    /// are refreshed from the identity when they differ. With no match a new
    /// account is created whose secret is derived from the provider and
    /// external id under the pepper.
    ///
    /// # Errors
    /// Returns a `DirectoryError` if the directory or hasher fails
    pub async fn resolve_external(
        &self,
        provider: &str,
        identity: &ExternalIdentity,
    ) -> Result<LocalAccount, DirectoryError> {
        if !identity.email.is_empty() {
            if let Some(mut account) = self.directory.find_by_email(&identity.email).await? {
                if !identity.name.is_empty() && account.display_name != identity.name {
                    account.display_name.clone_from(&identity.name);
                    self.directory.update_user(&account).await?;
                }
                debug!(
                    "Matched {provider} identity {} to account {} by email",
                    identity.id, account.id
                );
                return Ok(account);
            }
        }

        let username = if identity.username.is_empty() {
            format!("{provider}_{}", identity.id)
        } else {
            identity.username.clone()
        };

        if let Some(mut account) = self.directory.find_by_username(&username).await? {
            let mut changed = false;
            if !identity.email.is_empty() && account.email != identity.email {
                account.email.clone_from(&identity.email);
                changed = true;
            }
            if !identity.name.is_empty() && account.display_name != identity.name {
                account.display_name.clone_from(&identity.name);
                changed = true;
            }
            if changed {
                self.directory.update_user(&account).await?;
            }
            debug!(
                "Matched {provider} identity {} to account {} by username",
                identity.id, account.id
            );
            return Ok(account);
        }

        let display_name = if identity.name.is_empty() {
            username.clone()
        } else {
            identity.name.clone()
        };
        let generated_secret = derive_keyed_secret(
            &self.policy.secret_pepper,
            &format!("external:{provider}:{}", identity.id),
        );

        let created = self
            .directory
            .create_user(NewAccount {
                username: username.clone(),
                email: identity.email.clone(),
                display_name,
                role: self.policy.default_role.clone(),
                quota: self.policy.default_quota,
                hashed_secret: self.hasher.hash(&generated_secret)?,
            })
            .await;

        let account = match created {
            Ok(account) => account,
            Err(DirectoryError::Conflict(reason)) => {
                // A concurrent sign-in created the same account first
                debug!("Lost account creation race for {username}: {reason}");
                return self
                    .find_existing(&identity.email, &username)
                    .await?
                    .ok_or(DirectoryError::Conflict(reason));
            }
            Err(e) => return Err(e),
        };

        info!(
            "👤 Created new user from {provider}: {} (ID: {})",
            account.username, account.id
        );
        Ok(account)
    }

    async fn find_existing(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<LocalAccount>, DirectoryError> {
        if !email.is_empty() {
            if let Some(account) = self.directory.find_by_email(email).await? {
                return Ok(Some(account));
            }
        }
        self.directory.find_by_username(username).await
    }

    /// Check a username/password pair against the directory
    ///
    /// Returns `None` for an unknown user or a wrong password.
    ///
    /// # Errors
    /// Returns a `DirectoryError` if the directory cannot be queried
    pub async fn authenticate_local(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<LocalAccount>, DirectoryError> {
        if username.is_empty() || password.is_empty() {
            return Ok(None);
        }
        let account = self.directory.find_by_username(username).await?;
        Ok(account.filter(|account| self.hasher.verify(password, &account.hashed_secret)))
    }

    /// Create a password account, e.g. the bootstrap user
    ///
    /// # Errors
    /// Returns `Conflict` if the username is taken, or a hashing failure
    pub async fn register_local(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<LocalAccount, DirectoryError> {
        let account = self
            .directory
            .create_user(NewAccount {
                username: username.to_string(),
                email: email.to_string(),
                display_name: username.to_string(),
                role: self.policy.default_role.clone(),
                quota: self.policy.default_quota,
                hashed_secret: self.hasher.hash(password)?,
            })
            .await?;
        info!("👤 Registered local user: {} (ID: {})", account.username, account.id);
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{Argon2SecretHasher, InMemoryUserDirectory};

    const PEPPER: &[u8] = b"test-pepper";

    fn policy() -> AccountPolicy {
        AccountPolicy {
            default_role: "common".to_string(),
            default_quota: 500_000,
            secret_pepper: PEPPER.to_vec(),
        }
    }

    fn resolver() -> (AccountResolver, Arc<InMemoryUserDirectory>) {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let resolver = AccountResolver::new(
            directory.clone(),
            Arc::new(Argon2SecretHasher::new(PEPPER.to_vec())),
            policy(),
        );
        (resolver, directory)
    }

    fn identity(id: &str, username: &str, email: &str, name: &str) -> ExternalIdentity {
        ExternalIdentity {
            id: id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_email_match_reuses_account_and_updates_name() {
        let (resolver, directory) = resolver();
        let existing = resolver
            .register_local("someone", "a@x.com", "pw")
            .await
            .unwrap();

        let account = resolver
            .resolve_external("coder", &identity("42", "u1", "a@x.com", "Alice"))
            .await
            .unwrap();

        assert_eq!(account.id, existing.id);
        assert_eq!(account.display_name, "Alice");
        assert_eq!(account.username, "someone");
        assert_eq!(directory.account_count().await, 1);
        let stored = directory.find_by_username("someone").await.unwrap().unwrap();
        assert_eq!(stored.display_name, "Alice");
    }

    #[tokio::test]
    async fn test_username_match_updates_email_and_name() {
        let (resolver, directory) = resolver();
        let existing = resolver.register_local("u1", "", "pw").await.unwrap();

        let account = resolver
            .resolve_external("coder", &identity("42", "u1", "new@x.com", "User One"))
            .await
            .unwrap();

        assert_eq!(account.id, existing.id);
        assert_eq!(account.email, "new@x.com");
        assert_eq!(account.display_name, "User One");
        assert_eq!(directory.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_no_match_creates_one_account_with_derived_secret() {
        let (resolver, directory) = resolver();

        let account = resolver
            .resolve_external("coder", &identity("42", "u1", "u1@x.com", ""))
            .await
            .unwrap();

        assert_eq!(directory.account_count().await, 1);
        assert_eq!(account.display_name, "u1");
        assert_eq!(account.role, "common");
        assert_eq!(account.quota, 500_000);

        let derived = derive_keyed_secret(PEPPER, "external:coder:42");
        let hasher = Argon2SecretHasher::new(PEPPER.to_vec());
        assert!(hasher.verify(&derived, &account.hashed_secret));

        // Same identity again resolves to the same account
        let again = resolver
            .resolve_external("coder", &identity("42", "u1", "u1@x.com", ""))
            .await
            .unwrap();
        assert_eq!(again.id, account.id);
        assert_eq!(directory.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_identity_without_username_gets_provider_scoped_name() {
        let (resolver, _) = resolver();
        let account = resolver
            .resolve_external("coder", &identity("99", "", "", ""))
            .await
            .unwrap();
        assert_eq!(account.username, "coder_99");
    }

    #[tokio::test]
    async fn test_authenticate_local() {
        let (resolver, _) = resolver();
        resolver
            .register_local("alice", "alice@example.com", "hunter2")
            .await
            .unwrap();

        assert!(resolver
            .authenticate_local("alice", "hunter2")
            .await
            .unwrap()
            .is_some());
        assert!(resolver
            .authenticate_local("alice", "wrong")
            .await
            .unwrap()
            .is_none());
        assert!(resolver
            .authenticate_local("nobody", "hunter2")
            .await
            .unwrap()
            .is_none());
        assert!(resolver.authenticate_local("alice", "").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_local_secrets_are_salted_argon2() {
        let (resolver, _) = resolver();
        let alice = resolver.register_local("alice", "", "same").await.unwrap();
        let bob = resolver.register_local("bob", "", "same").await.unwrap();

        assert!(alice.hashed_secret.starts_with("$argon2id$"));
        assert_ne!(alice.hashed_secret, bob.hashed_secret);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_sign_ins_share_one_account() {
        let (resolver, directory) = resolver();
        let resolver = Arc::new(resolver);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                resolver
                    .resolve_external("coder", &identity("7", "racer", "racer@x.com", "Racer"))
                    .await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }

        assert_eq!(directory.account_count().await, 1);
        assert!(ids.iter().all(|id| *id == ids[0]));
    }
}
