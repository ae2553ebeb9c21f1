//! Dependency injection for the handshake services
//!
//! Every collaborator defaults to its in-memory or HTTP implementation and can
//! be swapped through [`ServiceConfigBuilder`] (a shared session cache, a real
//! user database, a provider-specific identity verifier).

use crate::accounts::{
    AccountPolicy, AccountResolver, CredentialStore, Argon2SecretHasher, InMemoryCredentialStore,
    InMemoryUserDirectory, SecretHasher, UserDirectory,
};
use crate::models::{DirectoryError, ProviderError};
use crate::providers::{IdentityVerifier, ProviderRegistry};
use crate::session::{
    AuthSessionController, CleanupScheduler, ControllerConfig, InMemorySessionStore, SessionStore,
};
use crate::settings::EditorAuthSettings;
use log::info;
use std::sync::Arc;

/// Service configuration builder for dependency injection
#[derive(Clone, Default)]
pub struct ServiceConfigBuilder {
    session_store: Option<Arc<dyn SessionStore + Send + Sync>>,
    user_directory: Option<Arc<dyn UserDirectory + Send + Sync>>,
    credential_store: Option<Arc<dyn CredentialStore + Send + Sync>>,
    secret_hasher: Option<Arc<dyn SecretHasher + Send + Sync>>,
    identity_verifier: Option<Arc<dyn IdentityVerifier + Send + Sync>>,
}

impl ServiceConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore + Send + Sync>) -> Self {
        self.session_store = Some(store);
        self
    }

    #[must_use]
    pub fn with_user_directory(mut self, directory: Arc<dyn UserDirectory + Send + Sync>) -> Self {
        self.user_directory = Some(directory);
        self
    }

    #[must_use]
    pub fn with_credential_store(
        mut self,
        credentials: Arc<dyn CredentialStore + Send + Sync>,
    ) -> Self {
        self.credential_store = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_secret_hasher(mut self, hasher: Arc<dyn SecretHasher + Send + Sync>) -> Self {
        self.secret_hasher = Some(hasher);
        self
    }

    /// Use a custom verifier for every external provider
    #[must_use]
    pub fn with_identity_verifier(
        mut self,
        verifier: Arc<dyn IdentityVerifier + Send + Sync>,
    ) -> Self {
        self.identity_verifier = Some(verifier);
        self
    }

    /// Wire the services together
    ///
    /// # Errors
    /// Returns a `ProviderError` if the provider registry cannot be built
    pub fn build(self, settings: EditorAuthSettings) -> Result<ServiceContainer, ProviderError> {
        info!("🔧 Configuring authentication session services...");

        let store: Arc<dyn SessionStore + Send + Sync> = match self.session_store {
            Some(store) => store,
            None => Arc::new(InMemorySessionStore::new()),
        };
        let directory: Arc<dyn UserDirectory + Send + Sync> = match self.user_directory {
            Some(directory) => directory,
            None => Arc::new(InMemoryUserDirectory::new()),
        };
        let credentials: Arc<dyn CredentialStore + Send + Sync> = match self.credential_store {
            Some(credentials) => credentials,
            None => Arc::new(InMemoryCredentialStore::new()),
        };
        let hasher: Arc<dyn SecretHasher + Send + Sync> = match self.secret_hasher {
            Some(hasher) => hasher,
            None => Arc::new(Argon2SecretHasher::new(
                settings.accounts.secret_pepper.as_bytes().to_vec(),
            )),
        };

        let providers = ProviderRegistry::from_settings(&settings, self.identity_verifier)?;
        let accounts = Arc::new(AccountResolver::new(
            directory,
            hasher,
            AccountPolicy::from_settings(&settings.accounts),
        ));

        let controller = AuthSessionController::new(
            store,
            Arc::new(providers),
            Arc::clone(&accounts),
            credentials,
            ControllerConfig::from_settings(&settings),
        );

        info!("🔧 Authentication session services configured");
        Ok(ServiceContainer {
            controller,
            accounts,
            settings,
        })
    }
}

/// Application service container for centralized dependency management
#[derive(Clone)]
pub struct ServiceContainer {
    controller: AuthSessionController,
    accounts: Arc<AccountResolver>,
    settings: EditorAuthSettings,
}

impl ServiceContainer {
    /// Container with every default collaborator
    ///
    /// # Errors
    /// Returns a `ProviderError` if the provider registry cannot be built
    pub fn new(settings: EditorAuthSettings) -> Result<Self, ProviderError> {
        ServiceConfigBuilder::new().build(settings)
    }

    #[must_use]
    pub fn controller(&self) -> &AuthSessionController {
        &self.controller
    }

    #[must_use]
    pub fn accounts(&self) -> &Arc<AccountResolver> {
        &self.accounts
    }

    #[must_use]
    pub fn settings(&self) -> &EditorAuthSettings {
        &self.settings
    }

    /// Background sweeper bound to this container's session store
    #[must_use]
    pub fn cleanup_scheduler(&self) -> CleanupScheduler {
        CleanupScheduler::from_settings(self.controller.store(), &self.settings)
    }

    /// Create the configured bootstrap account, if any
    ///
    /// An existing account with the same username is left alone.
    ///
    /// # Errors
    /// Returns a `DirectoryError` if the account cannot be created
    pub async fn bootstrap_accounts(&self) -> Result<(), DirectoryError> {
        let accounts = &self.settings.accounts;
        if accounts.bootstrap_username.is_empty() || accounts.bootstrap_password.is_empty() {
            return Ok(());
        }

        match self
            .accounts
            .register_local(&accounts.bootstrap_username, "", &accounts.bootstrap_password)
            .await
        {
            Ok(_) => Ok(()),
            Err(DirectoryError::Conflict(_)) => {
                info!(
                    "ℹ Bootstrap user {} already exists",
                    accounts.bootstrap_username
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
