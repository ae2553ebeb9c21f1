//! Error types for the authentication handshake
//!
//! Each layer has its own error enum; `AuthError` is the boundary taxonomy
//! that handlers turn into soft-failure JSON bodies.

use thiserror::Error;

/// Session store failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// Empty id or otherwise unusable input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing or expired session
    #[error("session not found")]
    NotFound,

    /// The update precondition did not hold (another writer got there first)
    #[error("session state changed concurrently")]
    Conflict,

    /// Backing storage failed unexpectedly
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Identity provider failures
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unsupported provider: {0}")]
    Unsupported(String),

    #[error("provider URL is required for provider {0}")]
    MissingUrl(String),

    #[error("invalid provider URL: {0}")]
    InvalidUrl(String),

    #[error("provider URL is not allowed: {0}")]
    UrlNotAllowed(String),

    #[error("callback is missing proof of authentication: {0}")]
    MissingProof(String),

    #[error("provider {0} does not resolve identities through a callback")]
    NotApplicable(String),

    #[error("provider is not configured: {0}")]
    NotConfigured(String),

    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider returned HTTP status {0}")]
    Status(u16),

    #[error("unparseable provider response: {0}")]
    Parse(String),
}

/// Account directory, credential store and hashing failures
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("account store failure: {0}")]
    Backend(String),

    #[error("account conflict: {0}")]
    Conflict(String),

    #[error("secret hashing failed: {0}")]
    Hashing(String),
}

/// Boundary-facing failures of the handshake
///
/// All of these are reported to clients as soft failures (`success: false`)
/// with the value of [`AuthError::code`] in the `error` field.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Session is absent, expired, or already consumed
    #[error("Invalid or expired session")]
    SessionNotFound,

    /// Completion attempted through the wrong provider path
    #[error("Provider {actual} cannot complete a session opened for {expected}")]
    ProviderMismatch { expected: String, actual: String },

    /// Upstream identity provider could not be reached or understood
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Local login rejected
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Unexpected persistence failure
    #[error("Internal storage failure: {0}")]
    InternalStorage(String),
}

impl AuthError {
    /// Stable machine-readable code for the `error` field of a soft failure
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation_error",
            AuthError::SessionNotFound => "session_not_found",
            AuthError::ProviderMismatch { .. } => "provider_mismatch",
            AuthError::ProviderUnavailable(_) => "provider_unavailable",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InternalStorage(_) => "internal_error",
        }
    }

    /// Expected outcomes are part of normal polling and are not logged as errors
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            AuthError::SessionNotFound | AuthError::Validation(_) | AuthError::InvalidCredentials
        )
    }

    /// Message safe to hand to clients
    ///
    /// Storage and upstream details stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            AuthError::InternalStorage(_) => "Failed to process authentication session".to_string(),
            AuthError::ProviderUnavailable(_) => {
                "Could not verify your identity with the provider".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidArgument(msg) => AuthError::Validation(msg),
            StoreError::NotFound | StoreError::Conflict => AuthError::SessionNotFound,
            StoreError::Backend(msg) => AuthError::InternalStorage(msg),
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unsupported(_)
            | ProviderError::MissingUrl(_)
            | ProviderError::InvalidUrl(_)
            | ProviderError::UrlNotAllowed(_)
            | ProviderError::MissingProof(_)
            | ProviderError::NotApplicable(_) => AuthError::Validation(err.to_string()),
            ProviderError::NotConfigured(_)
            | ProviderError::Request(_)
            | ProviderError::Status(_)
            | ProviderError::Parse(_) => AuthError::ProviderUnavailable(err.to_string()),
        }
    }
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        AuthError::InternalStorage(err.to_string())
    }
}
