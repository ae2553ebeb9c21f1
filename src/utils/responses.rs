//! HTTP response handling
//!
//! Every JSON endpoint answers with the same envelope:
//! `{ "success": bool, "message"?: string, "error"?: code, "data"?: object }`.
//! Failures the client is expected to handle are soft failures: HTTP 200 with
//! `success: false`. Only a missing session id is a transport-level 400.

use crate::models::AuthError;
use actix_web::{http::header, HttpResponse};
use serde::Serialize;
use serde_json::json;
use std::sync::LazyLock;

// ===============================
// CACHED RESPONSES FOR PERFORMANCE
// ===============================

/// Global instance of pre-serialized common responses
static CACHED_RESPONSES: LazyLock<CachedResponses> = LazyLock::new(CachedResponses::new);

/// Pre-serialized bodies of responses that never vary
struct CachedResponses {
    missing_session_id: String,
    invalid_request: String,
}

impl CachedResponses {
    fn new() -> Self {
        Self {
            missing_session_id: Self::create_json("missing_session_id", "Session ID is required"),
            invalid_request: Self::create_json("validation_error", "Invalid request parameters"),
        }
    }

    fn create_json(error: &str, message: &str) -> String {
        json!({
            "success": false,
            "error": error,
            "message": message,
        })
        .to_string()
    }
}

/// The response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            error: None,
            data: Some(data),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    #[must_use]
    pub fn failure(error: &AuthError) -> Self {
        Self {
            success: false,
            message: Some(error.public_message()),
            error: Some(error.code().to_string()),
            data: None,
        }
    }
}

pub struct ResponseBuilder;

impl ResponseBuilder {
    /// 200 with `success: true` and `data`
    #[must_use]
    pub fn success<T: Serialize>(data: T) -> HttpResponse {
        HttpResponse::Ok().json(ApiResponse::ok(data))
    }

    /// 200 with `success: true`, `data` and a human-readable message
    #[must_use]
    pub fn success_with_message<T: Serialize>(message: &str, data: T) -> HttpResponse {
        HttpResponse::Ok().json(ApiResponse::ok(data).with_message(message))
    }

    /// 200 with `success: false` describing `error`
    #[must_use]
    pub fn soft_failure(error: &AuthError) -> HttpResponse {
        HttpResponse::Ok().json(ApiResponse::failure(error))
    }

    /// 400 for a request without a session id
    #[must_use]
    pub fn missing_session_id() -> HttpResponse {
        HttpResponse::BadRequest()
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .body(CACHED_RESPONSES.missing_session_id.clone())
    }

    /// Soft failure for a body that could not be parsed
    #[must_use]
    pub fn invalid_request() -> HttpResponse {
        HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .body(CACHED_RESPONSES.invalid_request.clone())
    }

    /// 302 to `location`
    #[must_use]
    pub fn redirect(location: &str) -> HttpResponse {
        HttpResponse::Found()
            .append_header((header::LOCATION, location.to_string()))
            .finish()
    }

    #[must_use]
    pub fn html(body: String) -> HttpResponse {
        HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, "text/html; charset=utf-8"))
            .body(body)
    }
}
