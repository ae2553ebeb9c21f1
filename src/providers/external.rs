//! Delegation to an upstream identity provider
//!
//! The browser is sent to `<provider_url><authorization_path>` with the
//! session id as `state`. When the provider redirects back, the callback's
//! proof (an authorization code or a bearer token) is turned into a user
//! identity by an [`IdentityVerifier`]. The default verifier speaks plain
//! HTTP: optional code exchange at `token_path`, then a bearer request to
//! `userinfo_path`.

use super::{normalize_provider_url, AuthTarget, AuthTargetRequest, CallbackContext, ProviderDelegate};
use crate::models::{ExternalIdentity, ProviderError, ProviderKind};
use crate::settings::ProviderSettings;
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Proof of authentication carried by a provider callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackProof {
    Code(String),
    AccessToken(String),
}

impl CallbackProof {
    /// Pick the strongest proof a callback carried; a token wins over a code
    #[must_use]
    pub fn from_callback(callback: &CallbackContext) -> Option<Self> {
        let non_empty = |value: &Option<String>| value.as_ref().filter(|v| !v.is_empty()).cloned();
        non_empty(&callback.access_token)
            .map(CallbackProof::AccessToken)
            .or_else(|| non_empty(&callback.code).map(CallbackProof::Code))
    }
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Exchange callback proof for the upstream user's identity
    ///
    /// # Errors
    /// Returns `ProviderError` on network failure, non-success status, or an
    /// unparseable response
    async fn verify(
        &self,
        provider: &ProviderSettings,
        provider_url: &str,
        proof: &CallbackProof,
    ) -> Result<ExternalIdentity, ProviderError>;
}

#[derive(Clone)]
pub struct ExternalProvider {
    settings: ProviderSettings,
    verifier: Arc<dyn IdentityVerifier + Send + Sync>,
    /// Normalized base URLs sessions may be opened against
    allowed_urls: Vec<String>,
}

impl ExternalProvider {
    #[must_use]
    pub fn new(
        settings: ProviderSettings,
        verifier: Arc<dyn IdentityVerifier + Send + Sync>,
    ) -> Self {
        let allowed_urls = settings
            .get_allowed_urls()
            .iter()
            .filter_map(|raw| match normalize_provider_url(raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Ignoring allowed URL for provider {}: {e}", settings.name);
                    None
                }
            })
            .collect::<Vec<_>>();
        if allowed_urls.is_empty() {
            warn!(
                "Provider {} has no allowed URLs; every session request for it will be refused",
                settings.name
            );
        }
        Self {
            settings,
            verifier,
            allowed_urls,
        }
    }

    /// Normalize a client-supplied provider URL and check it against the allowed list
    ///
    /// Identities are trusted by email, so a session must never be bound
    /// to an upstream the operator has not listed.
    ///
    /// # Errors
    /// Returns `InvalidUrl` for an unusable URL and `UrlNotAllowed` for one
    /// that is not listed
    pub fn accept_provider_url(&self, raw: &str) -> Result<String, ProviderError> {
        let url = normalize_provider_url(raw)?;
        if self
            .allowed_urls
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&url))
        {
            Ok(url)
        } else {
            Err(ProviderError::UrlNotAllowed(url))
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    #[must_use]
    pub fn credential_name(&self) -> &str {
        &self.settings.credential_name
    }

    #[must_use]
    pub fn callback_url(server_base_url: &str, session_id: &str) -> String {
        format!(
            "{server_base_url}/auth/provider/callback?session_id={}",
            urlencoding::encode(session_id)
        )
    }
}

#[async_trait]
impl ProviderDelegate for ExternalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::External(self.settings.name.clone())
    }

    fn build_auth_target(
        &self,
        request: &AuthTargetRequest<'_>,
    ) -> Result<AuthTarget, ProviderError> {
        let provider_url = request
            .provider_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingUrl(self.settings.name.clone()))?;
        let base = normalize_provider_url(provider_url)?;
        let callback_url = Self::callback_url(request.server_base_url, request.session_id);

        let mut auth_url = url::Url::parse(&format!("{base}{}", self.settings.authorization_path))
            .map_err(|e| ProviderError::InvalidUrl(e.to_string()))?;
        {
            let mut query = auth_url.query_pairs_mut();
            query
                .append_pair("source", "vscode")
                .append_pair("state", request.session_id)
                .append_pair("redirect_uri", &callback_url);
            if let Some(client_id) = self.settings.get_client_id() {
                query.append_pair("client_id", &client_id);
            }
        }

        Ok(AuthTarget {
            auth_url: auth_url.into(),
            callback_url: Some(callback_url),
        })
    }

    async fn resolve_identity(
        &self,
        provider_url: Option<&str>,
        callback: &CallbackContext,
    ) -> Result<ExternalIdentity, ProviderError> {
        let provider_url = provider_url
            .ok_or_else(|| ProviderError::MissingUrl(self.settings.name.clone()))?;
        let base = normalize_provider_url(provider_url)?;
        let proof = CallbackProof::from_callback(callback).ok_or_else(|| {
            ProviderError::MissingProof("expected a code or access_token".to_string())
        })?;

        self.verifier.verify(&self.settings, &base, &proof).await
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    /// Providers disagree on whether this is a number or a string
    id: serde_json::Value,
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
}

impl UserInfoResponse {
    fn into_identity(self) -> Result<ExternalIdentity, ProviderError> {
        let id = match self.id {
            serde_json::Value::String(id) if !id.is_empty() => id,
            serde_json::Value::Number(id) => id.to_string(),
            other => {
                return Err(ProviderError::Parse(format!(
                    "user info has no usable id: {other}"
                )))
            }
        };
        Ok(ExternalIdentity {
            id,
            username: self.username,
            email: self.email,
            name: self.name,
        })
    }
}

/// [`IdentityVerifier`] that calls the provider's HTTP endpoints
#[derive(Clone)]
pub struct HttpIdentityVerifier {
    http: reqwest::Client,
}

impl HttpIdentityVerifier {
    /// # Errors
    /// Returns `NotConfigured` if the TLS backend cannot be initialised
    pub fn new() -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;
        Ok(Self { http })
    }

    fn timeout(provider: &ProviderSettings) -> Duration {
        Duration::from_secs(provider.request_timeout_seconds.max(1))
    }

    async fn exchange_code(
        &self,
        provider: &ProviderSettings,
        provider_url: &str,
        code: &str,
    ) -> Result<String, ProviderError> {
        let token_path = provider.token_path.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "provider {} has no token_path for code exchange",
                provider.name
            ))
        })?;

        let client_id = provider.get_client_id();
        let client_secret = provider.get_client_secret();
        let mut params = vec![("grant_type", "authorization_code"), ("code", code)];
        if let Some(client_id) = client_id.as_deref() {
            params.push(("client_id", client_id));
        }
        if let Some(client_secret) = client_secret.as_deref() {
            params.push(("client_secret", client_secret));
        }

        debug!("Exchanging authorization code with {}", provider.name);
        let response = self
            .http
            .post(format!("{provider_url}{token_path}"))
            .timeout(Self::timeout(provider))
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let response = Self::ensure_success(response)?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn fetch_user(
        &self,
        provider: &ProviderSettings,
        provider_url: &str,
        access_token: &str,
    ) -> Result<ExternalIdentity, ProviderError> {
        let response = self
            .http
            .get(format!("{provider_url}{}", provider.userinfo_path))
            .timeout(Self::timeout(provider))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let response = Self::ensure_success(response)?;
        let user: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        user.into_identity()
    }

    fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ProviderError::Status(response.status().as_u16()))
        }
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(
        &self,
        provider: &ProviderSettings,
        provider_url: &str,
        proof: &CallbackProof,
    ) -> Result<ExternalIdentity, ProviderError> {
        let access_token = match proof {
            CallbackProof::AccessToken(token) => token.clone(),
            CallbackProof::Code(code) => self.exchange_code(provider, provider_url, code).await?,
        };
        self.fetch_user(provider, provider_url, &access_token).await
    }
}
