//! Completion paths for authentication sessions
//!
//! A session is completed either by the built-in login page ([`LocalProvider`])
//! or by a named upstream identity provider ([`ExternalProvider`]). Both sit
//! behind the [`ProviderDelegate`] capability and are collected in the closed
//! [`Provider`] enum, so every variant is forced to implement both operations.

pub mod external;
pub mod local;

pub use external::{CallbackProof, ExternalProvider, HttpIdentityVerifier, IdentityVerifier};
pub use local::LocalProvider;

use crate::models::{ExternalIdentity, ProviderError, ProviderKind, LOCAL_PROVIDER};
use crate::settings::EditorAuthSettings;
use crate::utils::logging::LoggingHelper;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Inputs for building the address a client's browser should open
#[derive(Debug, Clone, Copy)]
pub struct AuthTargetRequest<'a> {
    pub session_id: &'a str,
    /// Public base URL of this service, without a trailing slash
    pub server_base_url: &'a str,
    pub provider_url: Option<&'a str>,
}

/// Browser target for a freshly opened session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTarget {
    pub auth_url: String,
    /// Where the provider sends the browser back to; external providers only
    pub callback_url: Option<String>,
}

/// What a provider callback carried
#[derive(Debug, Clone, Default)]
pub struct CallbackContext {
    pub session_id: String,
    pub code: Option<String>,
    pub access_token: Option<String>,
    /// Provider name asserted by the callback, if any
    pub provider: Option<String>,
}

#[async_trait]
pub trait ProviderDelegate: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Address the client's browser should visit to authenticate
    ///
    /// # Errors
    /// Returns `MissingUrl` or `InvalidUrl` when the provider URL is required but unusable
    fn build_auth_target(&self, request: &AuthTargetRequest<'_>)
        -> Result<AuthTarget, ProviderError>;

    /// Turn a callback's proof of authentication into an external identity
    ///
    /// # Errors
    /// Returns `NotApplicable` for the local path, `MissingProof` when the
    /// callback carried nothing usable, and request/status/parse errors when
    /// the upstream provider fails
    async fn resolve_identity(
        &self,
        provider_url: Option<&str>,
        callback: &CallbackContext,
    ) -> Result<ExternalIdentity, ProviderError>;
}

/// The closed set of completion paths
#[derive(Clone)]
pub enum Provider {
    Local(LocalProvider),
    External(ExternalProvider),
}

#[async_trait]
impl ProviderDelegate for Provider {
    fn kind(&self) -> ProviderKind {
        match self {
            Provider::Local(p) => p.kind(),
            Provider::External(p) => p.kind(),
        }
    }

    fn build_auth_target(
        &self,
        request: &AuthTargetRequest<'_>,
    ) -> Result<AuthTarget, ProviderError> {
        match self {
            Provider::Local(p) => p.build_auth_target(request),
            Provider::External(p) => p.build_auth_target(request),
        }
    }

    async fn resolve_identity(
        &self,
        provider_url: Option<&str>,
        callback: &CallbackContext,
    ) -> Result<ExternalIdentity, ProviderError> {
        match self {
            Provider::Local(p) => p.resolve_identity(provider_url, callback).await,
            Provider::External(p) => p.resolve_identity(provider_url, callback).await,
        }
    }
}

impl Provider {
    #[must_use]
    pub fn requires_provider_url(&self) -> bool {
        matches!(self, Provider::External(_))
    }

    /// Check the provider URL a client asked for
    ///
    /// # Errors
    /// Returns `NotApplicable` for the local path, otherwise see
    /// [`ExternalProvider::accept_provider_url`]
    pub fn accept_provider_url(&self, raw: &str) -> Result<String, ProviderError> {
        match self {
            Provider::Local(p) => Err(ProviderError::NotApplicable(p.kind().to_string())),
            Provider::External(p) => p.accept_provider_url(raw),
        }
    }

    /// Name of the credential issued to sessions completed through this path
    #[must_use]
    pub fn credential_name<'a>(&'a self, local_name: &'a str) -> &'a str {
        match self {
            Provider::Local(_) => local_name,
            Provider::External(p) => p.credential_name(),
        }
    }
}

/// Lookup of providers by name
#[derive(Clone)]
pub struct ProviderRegistry {
    local: Provider,
    external: HashMap<String, Provider>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Registry with only the local provider
    #[must_use]
    pub fn new() -> Self {
        Self {
            local: Provider::Local(LocalProvider),
            external: HashMap::new(),
        }
    }

    /// Build the registry from the enabled providers in settings
    ///
    /// # Errors
    /// Returns `NotConfigured` if a provider has no name or shadows `local`,
    /// or if the HTTP client cannot be created
    pub fn from_settings(
        settings: &EditorAuthSettings,
        verifier: Option<Arc<dyn IdentityVerifier + Send + Sync>>,
    ) -> Result<Self, ProviderError> {
        LoggingHelper::log_provider_initialization();

        let verifier: Arc<dyn IdentityVerifier + Send + Sync> = match verifier {
            Some(verifier) => verifier,
            None => Arc::new(HttpIdentityVerifier::new()?),
        };

        let mut registry = Self::new();
        for provider_settings in &settings.providers {
            if !provider_settings.enabled {
                LoggingHelper::log_provider_disabled(&provider_settings.name);
                continue;
            }
            LoggingHelper::log_provider_configured(
                provider_settings.get_display_name(),
                &provider_settings.name,
                provider_settings.token_path.is_some(),
            );
            registry = registry.with_external(ExternalProvider::new(
                provider_settings.clone(),
                Arc::clone(&verifier),
            ))?;
        }

        let names = registry.external_names();
        LoggingHelper::log_providers_summary(&names);
        Ok(registry)
    }

    /// Register an external provider
    ///
    /// # Errors
    /// Returns `NotConfigured` if the name is empty or reserved
    pub fn with_external(mut self, provider: ExternalProvider) -> Result<Self, ProviderError> {
        let name = provider.name().to_string();
        if name.is_empty() || name.eq_ignore_ascii_case(LOCAL_PROVIDER) {
            return Err(ProviderError::NotConfigured(format!(
                "invalid provider name '{name}'"
            )));
        }
        self.external.insert(name, Provider::External(provider));
        Ok(self)
    }

    /// Resolve a requested provider name; absent or empty means local
    ///
    /// # Errors
    /// Returns `Unsupported` for a name that is not registered
    pub fn resolve(&self, name: Option<&str>) -> Result<&Provider, ProviderError> {
        match name.map(str::trim) {
            None | Some("") => Ok(&self.local),
            Some(name) if name.eq_ignore_ascii_case(LOCAL_PROVIDER) => Ok(&self.local),
            Some(name) => self
                .external
                .get(name)
                .ok_or_else(|| ProviderError::Unsupported(name.to_string())),
        }
    }

    /// Provider recorded on a session
    ///
    /// # Errors
    /// Returns `Unsupported` if the provider was removed from configuration
    pub fn get(&self, kind: &ProviderKind) -> Result<&Provider, ProviderError> {
        match kind {
            ProviderKind::Local => Ok(&self.local),
            ProviderKind::External(name) => self
                .external
                .get(name)
                .ok_or_else(|| ProviderError::Unsupported(name.clone())),
        }
    }

    #[must_use]
    pub fn external_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.external.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Normalize and check a provider base URL
///
/// Only absolute http(s) URLs are accepted; a trailing slash is dropped.
///
/// # Errors
/// Returns `InvalidUrl` if the value does not parse or uses another scheme
pub fn normalize_provider_url(raw: &str) -> Result<String, ProviderError> {
    let trimmed = raw.trim();
    let parsed =
        url::Url::parse(trimmed).map_err(|e| ProviderError::InvalidUrl(format!("{trimmed}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ProviderError::InvalidUrl(trimmed.to_string()));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}
