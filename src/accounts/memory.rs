//! Process-local account and credential stores

use super::{CredentialStore, IssuedCredential, LocalAccount, NewAccount, UserDirectory};
use crate::models::DirectoryError;
use crate::utils::crypto::generate_credential_secret;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct DirectoryState {
    accounts: HashMap<i64, LocalAccount>,
    last_id: i64,
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    state: RwLock<DirectoryState>,
}

impl InMemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn account_count(&self) -> usize {
        self.state.read().await.accounts.len()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<LocalAccount>, DirectoryError> {
        if email.is_empty() {
            return Ok(None);
        }
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<LocalAccount>, DirectoryError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn create_user(&self, account: NewAccount) -> Result<LocalAccount, DirectoryError> {
        let mut state = self.state.write().await;
        if state
            .accounts
            .values()
            .any(|existing| existing.username == account.username)
        {
            return Err(DirectoryError::Conflict(format!(
                "username {} is taken",
                account.username
            )));
        }

        state.last_id += 1;
        let created = LocalAccount {
            id: state.last_id,
            username: account.username,
            email: account.email,
            display_name: account.display_name,
            role: account.role,
            quota: account.quota,
            hashed_secret: account.hashed_secret,
        };
        state.accounts.insert(created.id, created.clone());
        debug!("Created account {} (ID: {})", created.username, created.id);
        Ok(created)
    }

    async fn update_user(&self, account: &LocalAccount) -> Result<(), DirectoryError> {
        let mut state = self.state.write().await;
        match state.accounts.get_mut(&account.id) {
            Some(stored) => {
                *stored = account.clone();
                Ok(())
            }
            None => Err(DirectoryError::Backend(format!(
                "account {} does not exist",
                account.id
            ))),
        }
    }
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: RwLock<HashMap<i64, IssuedCredential>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_or_create_default_credential(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<IssuedCredential, DirectoryError> {
        if user_id <= 0 {
            return Err(DirectoryError::Backend(format!(
                "invalid user id {user_id}"
            )));
        }

        let mut credentials = self.credentials.write().await;
        let credential = credentials
            .entry(user_id)
            .or_insert_with(|| IssuedCredential {
                secret: generate_credential_secret(),
                name: name.to_string(),
            });
        if credential.name != name {
            debug!("Renaming default credential of user {user_id} to {name}");
            credential.name = name.to_string();
        }
        Ok(credential.clone())
    }
}
