//! Request and response bodies of the HTTP boundary
//!
//! Request keys are camelCase; the older snake_case spellings used by
//! existing editor extensions are accepted as aliases.

use serde::{Deserialize, Serialize};

/// Body of `POST /auth/vscode/init`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    #[serde(default, alias = "client_name")]
    pub client_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, alias = "providerURL", alias = "provider_url", alias = "coder_url")]
    pub provider_url: Option<String>,
}

/// `data` of a successful init response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponseData {
    pub session_id: String,
    pub auth_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub expires_in: i64,
    pub poll_interval_seconds: u64,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_url: Option<String>,
}

/// Local user identity returned alongside a delivered credential
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUser {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

/// `data` of a successful status poll
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusResponseData {
    Pending {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Completed {
        credential: String,
        token_name: String,
        user: StatusUser,
    },
}

/// Body of `POST /auth/vscode/login`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "session_id")]
    pub session_id: String,
    pub username: String,
    pub password: String,
}

/// `data` of a successful local login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponseData {
    pub session_id: String,
    pub redirect_url: String,
}

/// Query of `GET /auth/provider/callback`
#[derive(Debug, Default, Deserialize)]
pub struct ProviderCallbackQuery {
    pub session_id: Option<String>,
    /// Correlation state echoed back by the provider; carries the session id
    pub state: Option<String>,
    pub code: Option<String>,
    pub access_token: Option<String>,
    pub provider: Option<String>,
    pub error: Option<String>,
}

/// Query of `GET /auth/vscode/success`
#[derive(Debug, Default, Deserialize)]
pub struct SuccessPageQuery {
    pub session_id: Option<String>,
    pub provider: Option<String>,
}
