use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod api;
pub mod errors;

pub use errors::{AuthError, DirectoryError, ProviderError, StoreError};

/// Provider name used for sessions completed through the built-in login page
pub const LOCAL_PROVIDER: &str = "local";

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Stored status of an authentication session
///
/// There is no stored `expired` state: expiry is always computed from
/// `expires_at`, so a record may say `pending` and still be dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Completed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which completion path a session belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum ProviderKind {
    /// Interactive login on this service's own login page
    Local,
    /// Delegated to a named upstream identity provider (e.g. `coder`)
    External(String),
}

impl ProviderKind {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ProviderKind::Local => LOCAL_PROVIDER,
            ProviderKind::External(name) => name,
        }
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::Local)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Credential attached to a session once it completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    /// Opaque API secret handed to the polling client
    pub secret: String,
    /// Display name of the credential
    pub name: String,
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
}

/// User identity reported by an upstream identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// A time-boxed record correlating a client's login request with its eventual credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub id: String,
    pub status: SessionStatus,
    pub client_name: String,
    pub client_version: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub provider: ProviderKind,
    /// Base address of the external provider, `None` for local sessions
    pub provider_url: Option<String>,
    /// Populated exactly once, when the session transitions to `completed`
    pub credential: Option<SessionCredential>,
    /// Upstream user info kept for audit after a delegated completion
    pub external_identity: Option<ExternalIdentity>,
}

impl AuthSession {
    /// Create a pending session starting now
    #[must_use]
    pub fn new_pending(
        id: String,
        client_name: String,
        client_version: String,
        provider: ProviderKind,
        provider_url: Option<String>,
        ttl: Duration,
    ) -> Self {
        Self::pending_at(
            id,
            client_name,
            client_version,
            provider,
            provider_url,
            Utc::now(),
            ttl,
        )
    }

    /// Create a pending session with an explicit creation instant
    #[must_use]
    pub fn pending_at(
        id: String,
        client_name: String,
        client_version: String,
        provider: ProviderKind,
        provider_url: Option<String>,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id,
            status: SessionStatus::Pending,
            client_name,
            client_version,
            created_at,
            expires_at: created_at + ttl,
            provider,
            provider_url,
            credential: None,
            external_identity: None,
        }
    }

    /// A session is dead once `now` is strictly past `expires_at`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Seconds left before expiry, clamped at zero
    #[must_use]
    pub fn expires_in_seconds(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == SessionStatus::Pending
    }
}

/// Partial update applied to a stored session
///
/// Every field is optional; `None` leaves the stored value untouched.
/// `expected_status` is a precondition checked by the store before anything
/// is written.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub expected_status: Option<SessionStatus>,
    pub status: Option<SessionStatus>,
    pub credential: Option<SessionCredential>,
    pub provider_url: Option<String>,
    pub external_identity: Option<ExternalIdentity>,
}

impl SessionUpdate {
    /// Transition a pending session to `completed` with its credential
    #[must_use]
    pub fn complete(
        credential: SessionCredential,
        external_identity: Option<ExternalIdentity>,
    ) -> Self {
        Self {
            expected_status: Some(SessionStatus::Pending),
            status: Some(SessionStatus::Completed),
            credential: Some(credential),
            provider_url: None,
            external_identity,
        }
    }

    /// Whether the precondition holds for `session`
    #[must_use]
    pub fn precondition_holds(&self, session: &AuthSession) -> bool {
        self.expected_status
            .is_none_or(|expected| expected == session.status)
    }

    /// Write the supplied fields into `session`
    pub fn apply_to(self, session: &mut AuthSession) {
        let SessionUpdate {
            expected_status: _,
            status,
            credential,
            provider_url,
            external_identity,
        } = self;

        if let Some(status) = status {
            session.status = status;
        }
        if let Some(credential) = credential {
            session.credential = Some(credential);
        }
        if let Some(provider_url) = provider_url {
            session.provider_url = Some(provider_url);
        }
        if let Some(external_identity) = external_identity {
            session.external_identity = Some(external_identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(ttl_seconds: i64) -> AuthSession {
        AuthSession::new_pending(
            "vscode_auth_test".to_string(),
            "ext".to_string(),
            "1.0".to_string(),
            ProviderKind::Local,
            None,
            Duration::seconds(ttl_seconds),
        )
    }

    #[test]
    fn test_expiry_is_created_plus_ttl() {
        let session = pending(600);
        assert_eq!(session.expires_at - session.created_at, Duration::seconds(600));
        assert!(session.is_pending());
        assert!(session.credential.is_none());
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let session = pending(600);
        assert!(!session.is_expired_at(session.expires_at));
        assert!(session.is_expired_at(session.expires_at + Duration::milliseconds(1)));
    }

    #[test]
    fn test_complete_update_respects_precondition() {
        let mut session = pending(600);
        let credential = SessionCredential {
            secret: "secret".to_string(),
            name: "VSCode Extension".to_string(),
            user_id: 7,
            username: "alice".to_string(),
            display_name: "Alice".to_string(),
        };
        let update = SessionUpdate::complete(credential.clone(), None);
        assert!(update.precondition_holds(&session));
        update.apply_to(&mut session);

        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.credential, Some(credential.clone()));
        assert!(!SessionUpdate::complete(credential, None).precondition_holds(&session));
    }

    #[test]
    fn test_empty_update_leaves_session_untouched() {
        let mut session = pending(600);
        let before = session.clone();
        SessionUpdate::default().apply_to(&mut session);
        assert_eq!(session.status, before.status);
        assert_eq!(session.provider_url, before.provider_url);
        assert!(session.credential.is_none());
    }

    #[test]
    fn test_provider_kind_names() {
        assert_eq!(ProviderKind::Local.name(), "local");
        assert_eq!(ProviderKind::External("coder".to_string()).to_string(), "coder");
        assert!(ProviderKind::Local.is_local());
    }
}
