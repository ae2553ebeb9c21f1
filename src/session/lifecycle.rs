//! Authentication session lifecycle
//!
//! `open` stores a pending session and hands the client a browser target,
//! `complete` attaches a freshly minted credential once the user has
//! authenticated, and `poll` reports progress and delivers that credential
//! exactly once.
//!
//! Identity resolution, account lookups and credential minting all happen
//! before the store is touched for the final update, so no slow call ever
//! runs while the store's lock is held.

use super::id::SessionIdGenerator;
use super::store::SessionStore;
use crate::accounts::{AccountResolver, CredentialStore, LocalAccount};
use crate::models::{
    AuthError, AuthSession, ExternalIdentity, ProviderKind, SessionCredential, SessionUpdate,
    StoreError,
};
use crate::providers::{AuthTargetRequest, CallbackContext, ProviderDelegate, ProviderRegistry};
use crate::settings::EditorAuthSettings;
use crate::utils::logging::LoggingHelper;
use log::debug;
use std::sync::Arc;

/// Upper bound on a configured session lifetime (one day)
const MAX_TTL_SECONDS: i64 = 86_400;

/// Tunables of the controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub ttl: chrono::Duration,
    pub poll_interval_seconds: u64,
    pub id_prefix: String,
    pub default_client_name: String,
    pub default_client_version: String,
    /// Credential name for sessions completed through the login page
    pub local_credential_name: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_settings(&EditorAuthSettings::default())
    }
}

impl ControllerConfig {
    #[must_use]
    pub fn from_settings(settings: &EditorAuthSettings) -> Self {
        let ttl_seconds = i64::try_from(settings.session.ttl_seconds)
            .unwrap_or(MAX_TTL_SECONDS)
            .min(MAX_TTL_SECONDS);
        Self {
            ttl: chrono::Duration::seconds(ttl_seconds),
            poll_interval_seconds: settings.session.poll_interval_seconds,
            id_prefix: settings.session.id_prefix.clone(),
            default_client_name: settings.session.default_client_name.clone(),
            default_client_version: settings.session.default_client_version.clone(),
            local_credential_name: settings.accounts.local_credential_name.clone(),
        }
    }
}

/// Parameters of a new session
#[derive(Debug, Clone, Default)]
pub struct OpenRequest {
    pub client_name: String,
    pub client_version: String,
    /// Absent or `local` selects the login page
    pub provider: Option<String>,
    pub provider_url: Option<String>,
    /// Public base URL of this service, used for login and callback addresses
    pub server_base_url: String,
}

/// What the client needs to drive the handshake
#[derive(Debug, Clone)]
pub struct OpenedSession {
    pub session_id: String,
    pub auth_url: String,
    pub callback_url: Option<String>,
    pub provider: ProviderKind,
    pub provider_url: Option<String>,
    pub expires_in: i64,
    pub poll_interval_seconds: u64,
}

/// Result of a status poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Pending,
    /// Delivered once; the session is gone by the time the caller sees this
    Completed(SessionCredential),
    /// Never existed, expired, or already delivered
    NotFound,
}

/// Identity established by a completion path
#[derive(Debug, Clone)]
pub enum ResolvedIdentity {
    /// An account that already proved itself, e.g. through the login page
    Account(LocalAccount),
    /// An upstream identity still to be mapped onto a local account
    External(ExternalIdentity),
}

#[derive(Clone)]
pub struct AuthSessionController {
    store: Arc<dyn SessionStore + Send + Sync>,
    providers: Arc<ProviderRegistry>,
    accounts: Arc<AccountResolver>,
    credentials: Arc<dyn CredentialStore + Send + Sync>,
    ids: SessionIdGenerator,
    config: ControllerConfig,
}

impl AuthSessionController {
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore + Send + Sync>,
        providers: Arc<ProviderRegistry>,
        accounts: Arc<AccountResolver>,
        credentials: Arc<dyn CredentialStore + Send + Sync>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            providers,
            accounts,
            credentials,
            ids: SessionIdGenerator::new(config.id_prefix.clone()),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn SessionStore + Send + Sync> {
        Arc::clone(&self.store)
    }

    /// Create a pending session and the address the client should open
    ///
    /// # Errors
    /// Returns `Validation` for an unknown provider or a missing, invalid or
    /// unlisted provider URL, and `InternalStorage` if the session cannot be stored
    pub async fn open(&self, request: OpenRequest) -> Result<OpenedSession, AuthError> {
        let provider = self.providers.resolve(request.provider.as_deref())?;
        let kind = provider.kind();

        let provider_url = if provider.requires_provider_url() {
            let raw = request
                .provider_url
                .as_deref()
                .filter(|url| !url.trim().is_empty())
                .ok_or_else(|| AuthError::Validation(format!(
                    "Provider URL is required for provider {kind}"
                )))?;
            Some(provider.accept_provider_url(raw)?)
        } else {
            None
        };

        let client_name = non_empty_or(request.client_name, &self.config.default_client_name);
        let client_version =
            non_empty_or(request.client_version, &self.config.default_client_version);

        let session_id = self.ids.generate();
        let target = provider.build_auth_target(&AuthTargetRequest {
            session_id: &session_id,
            server_base_url: request.server_base_url.trim_end_matches('/'),
            provider_url: provider_url.as_deref(),
        })?;

        let session = AuthSession::new_pending(
            session_id.clone(),
            client_name,
            client_version,
            kind.clone(),
            provider_url.clone(),
            self.config.ttl,
        );
        let client_name = session.client_name.clone();
        self.store.put(session).await?;
        LoggingHelper::log_session_opened(&session_id, &kind, &client_name);

        Ok(OpenedSession {
            session_id,
            auth_url: target.auth_url,
            callback_url: target.callback_url,
            provider: kind,
            provider_url,
            expires_in: self.config.ttl.num_seconds(),
            poll_interval_seconds: self.config.poll_interval_seconds,
        })
    }

    /// Report a session's progress, delivering its credential at most once
    ///
    /// A completed session is removed from the store in the same step that
    /// reads it, so a concurrent or later poll can never see it again.
    ///
    /// # Errors
    /// Returns `Validation` for an empty id and `InternalStorage` if the store fails
    pub async fn poll(&self, session_id: &str) -> Result<PollOutcome, AuthError> {
        if session_id.is_empty() {
            return Err(AuthError::Validation("Session ID is required".to_string()));
        }

        let session = match self.store.get(session_id).await {
            Ok(session) => session,
            Err(StoreError::NotFound) => return Ok(PollOutcome::NotFound),
            Err(e) => return Err(e.into()),
        };

        if session.is_pending() {
            return Ok(PollOutcome::Pending);
        }

        // Claim the record; whoever removes it delivers the credential
        match self.store.remove(session_id).await? {
            Some(AuthSession {
                credential: Some(credential),
                ..
            }) => {
                LoggingHelper::log_credential_delivered(session_id);
                Ok(PollOutcome::Completed(credential))
            }
            Some(_) => Err(AuthError::InternalStorage(format!(
                "completed session {session_id} has no credential"
            ))),
            None => {
                debug!("Auth session {session_id} was claimed by a concurrent poll");
                Ok(PollOutcome::NotFound)
            }
        }
    }

    /// Mark a pending session completed for `identity`, coming in through `via`
    ///
    /// # Errors
    /// Returns `SessionNotFound` if the session is gone, expired, already
    /// completed or completed concurrently; `ProviderMismatch` if `via` is not
    /// the session's provider; directory failures as `InternalStorage`
    pub async fn complete(
        &self,
        session_id: &str,
        via: &ProviderKind,
        identity: ResolvedIdentity,
    ) -> Result<SessionCredential, AuthError> {
        let session = self.store.get(session_id).await?;
        if session.provider != *via {
            return Err(AuthError::ProviderMismatch {
                expected: session.provider.to_string(),
                actual: via.to_string(),
            });
        }
        if !session.is_pending() {
            return Err(AuthError::SessionNotFound);
        }

        let (credential, external_identity) = match self.issue_credential(via, identity).await {
            Ok(issued) => issued,
            Err(e) => {
                // A concurrent completion may have won while we were resolving
                return match self.store.get(session_id).await {
                    Ok(current) if current.is_pending() => Err(e),
                    Ok(_) | Err(StoreError::NotFound) => {
                        debug!("Auth session {session_id} was completed concurrently: {e}");
                        Err(AuthError::SessionNotFound)
                    }
                    Err(store_error) => Err(store_error.into()),
                };
            }
        };

        self.store
            .apply_update(
                session_id,
                SessionUpdate::complete(credential.clone(), external_identity),
            )
            .await?;

        LoggingHelper::log_session_completed(session_id, via, &credential.username);
        Ok(credential)
    }

    async fn issue_credential(
        &self,
        via: &ProviderKind,
        identity: ResolvedIdentity,
    ) -> Result<(SessionCredential, Option<ExternalIdentity>), AuthError> {
        let provider = self.providers.get(via)?;
        let (account, external_identity) = match identity {
            ResolvedIdentity::Account(account) => (account, None),
            ResolvedIdentity::External(external) => {
                let account = self.accounts.resolve_external(via.name(), &external).await?;
                (account, Some(external))
            }
        };

        let issued = self
            .credentials
            .get_or_create_default_credential(
                account.id,
                provider.credential_name(&self.config.local_credential_name),
            )
            .await?;

        let credential = SessionCredential {
            secret: issued.secret,
            name: issued.name,
            user_id: account.id,
            username: account.username,
            display_name: account.display_name,
        };
        Ok((credential, external_identity))
    }

    /// Complete a local session with a username and password
    ///
    /// # Errors
    /// Returns `InvalidCredentials` on a failed login (the session stays
    /// pending), plus everything [`Self::complete`] can return
    pub async fn complete_local_login(
        &self,
        session_id: &str,
        username: &str,
        password: &str,
    ) -> Result<SessionCredential, AuthError> {
        let session = self.store.get(session_id).await?;
        if !session.provider.is_local() {
            return Err(AuthError::ProviderMismatch {
                expected: session.provider.to_string(),
                actual: ProviderKind::Local.to_string(),
            });
        }

        let account = self
            .accounts
            .authenticate_local(username.trim(), password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.complete(session_id, &ProviderKind::Local, ResolvedIdentity::Account(account))
            .await
    }

    /// Finish an external session from a provider redirect
    ///
    /// Returns the provider that completed the session.
    ///
    /// # Errors
    /// Returns `ProviderMismatch` if the callback does not belong to the
    /// session's provider, `ProviderUnavailable` if the upstream lookup fails
    /// (the session stays pending), plus everything [`Self::complete`] can return
    pub async fn handle_provider_callback(
        &self,
        callback: CallbackContext,
    ) -> Result<ProviderKind, AuthError> {
        let session = self.store.get(&callback.session_id).await?;
        let kind = session.provider.clone();

        let asserted = callback.provider.as_deref().filter(|p| !p.is_empty());
        if kind.is_local() || asserted.is_some_and(|p| p != kind.name()) {
            return Err(AuthError::ProviderMismatch {
                expected: kind.to_string(),
                actual: asserted.unwrap_or("external").to_string(),
            });
        }
        if !session.is_pending() {
            return Err(AuthError::SessionNotFound);
        }

        let provider = self.providers.get(&kind)?;
        let identity = provider
            .resolve_identity(session.provider_url.as_deref(), &callback)
            .await?;

        self.complete(
            &callback.session_id,
            &kind,
            ResolvedIdentity::External(identity),
        )
        .await?;
        Ok(kind)
    }
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value
    }
}
