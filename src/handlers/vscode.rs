// Editor-facing handshake endpoints
use super::helpers::{is_plausible_session_id, server_base_url, success_page_path};
use crate::models::api::{
    InitRequest, InitResponseData, LoginRequest, LoginResponseData, StatusResponseData, StatusUser,
};
use crate::models::{AuthError, LOCAL_PROVIDER};
use crate::session::{AuthSessionController, OpenRequest, PollOutcome};
use crate::settings::EditorAuthSettings;
use crate::utils::logging::LoggingHelper;
use crate::utils::responses::ResponseBuilder;
use actix_web::{web, HttpRequest, HttpResponse, Result};
use log::debug;

/// `POST /auth/vscode/init`
///
/// The body is parsed here rather than through an extractor so that a
/// malformed body is a soft failure like every other input problem. An
/// empty body opens a local session with default client details.
pub async fn init_auth(
    req: HttpRequest,
    body: web::Bytes,
    controller: web::Data<AuthSessionController>,
    settings: web::Data<EditorAuthSettings>,
) -> Result<HttpResponse> {
    let request: InitRequest = if body.is_empty() {
        InitRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                debug!("Rejected init request body: {e}");
                return Ok(ResponseBuilder::invalid_request());
            }
        }
    };

    let opened = controller
        .open(OpenRequest {
            client_name: request.client_name,
            client_version: request.version,
            provider: request.provider,
            provider_url: request.provider_url,
            server_base_url: server_base_url(&settings, &req),
        })
        .await;

    Ok(match opened {
        Ok(opened) => ResponseBuilder::success(InitResponseData {
            session_id: opened.session_id,
            auth_url: opened.auth_url,
            callback_url: opened.callback_url,
            expires_in: opened.expires_in,
            poll_interval_seconds: opened.poll_interval_seconds,
            provider: opened.provider.name().to_string(),
            provider_url: opened.provider_url,
        }),
        Err(e) => {
            LoggingHelper::log_auth_failure("Opening session", "-", &e);
            ResponseBuilder::soft_failure(&e)
        }
    })
}

/// `GET /auth/vscode/status/{session_id}`
pub async fn auth_status(
    path: web::Path<String>,
    controller: web::Data<AuthSessionController>,
) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let session_id = session_id.trim();
    if session_id.is_empty() {
        return Ok(ResponseBuilder::missing_session_id());
    }
    if !is_plausible_session_id(session_id) {
        return Ok(ResponseBuilder::soft_failure(&AuthError::SessionNotFound));
    }

    Ok(match controller.poll(session_id).await {
        Ok(PollOutcome::Pending) => ResponseBuilder::success(StatusResponseData::Pending {
            message: "Waiting for user authentication".to_string(),
        }),
        Ok(PollOutcome::Completed(credential)) => ResponseBuilder::success_with_message(
            "Authentication completed",
            StatusResponseData::Completed {
                credential: credential.secret,
                token_name: credential.name,
                user: StatusUser {
                    id: credential.user_id,
                    username: credential.username,
                    display_name: credential.display_name,
                },
            },
        ),
        Ok(PollOutcome::NotFound) => {
            debug!("Status poll for unknown or expired session {session_id}");
            ResponseBuilder::soft_failure(&AuthError::SessionNotFound)
        }
        Err(e) => {
            LoggingHelper::log_auth_failure("Polling session", session_id, &e);
            ResponseBuilder::soft_failure(&e)
        }
    })
}

/// `GET /auth/vscode/status` without an id
pub async fn missing_session_id() -> Result<HttpResponse> {
    Ok(ResponseBuilder::missing_session_id())
}

/// `POST /auth/vscode/login`: the login page's password submission
pub async fn local_login(
    body: web::Bytes,
    controller: web::Data<AuthSessionController>,
) -> Result<HttpResponse> {
    let request: LoginRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Rejected login request body: {e}");
            return Ok(ResponseBuilder::invalid_request());
        }
    };

    let session_id = request.session_id.trim();
    if session_id.is_empty() {
        return Ok(ResponseBuilder::soft_failure(&AuthError::Validation(
            "Session ID is required".to_string(),
        )));
    }

    Ok(
        match controller
            .complete_local_login(session_id, &request.username, &request.password)
            .await
        {
            Ok(_) => ResponseBuilder::success_with_message(
                "Authentication completed, return to your editor",
                LoginResponseData {
                    session_id: session_id.to_string(),
                    redirect_url: success_page_path(session_id, LOCAL_PROVIDER),
                },
            ),
            Err(e) => {
                LoggingHelper::log_auth_failure("Local login", session_id, &e);
                ResponseBuilder::soft_failure(&e)
            }
        },
    )
}
