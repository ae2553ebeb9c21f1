// External identity provider callback handler
use super::helpers::{is_plausible_session_id, success_page_path};
use crate::models::api::ProviderCallbackQuery;
use crate::models::AuthError;
use crate::providers::CallbackContext;
use crate::session::AuthSessionController;
use crate::utils::logging::LoggingHelper;
use crate::utils::responses::ResponseBuilder;
use actix_web::{web, HttpResponse, Result};
use log::warn;

/// `GET /auth/provider/callback`
///
/// The session id arrives as `session_id` on our own redirect URI, or as the
/// `state` the provider echoes back. On success the browser is sent to the
/// success page; the editor picks the credential up on its next poll.
pub async fn provider_callback(
    query: web::Query<ProviderCallbackQuery>,
    controller: web::Data<AuthSessionController>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let Some(session_id) = query
        .session_id
        .or(query.state)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
    else {
        return Ok(ResponseBuilder::missing_session_id());
    };

    if !is_plausible_session_id(&session_id) {
        return Ok(ResponseBuilder::soft_failure(&AuthError::SessionNotFound));
    }

    if let Some(error) = query.error.filter(|e| !e.is_empty()) {
        warn!("⚠️  Identity provider reported an error for session {session_id}: {error}");
        return Ok(ResponseBuilder::soft_failure(&AuthError::Validation(
            format!("Identity provider reported an error: {error}"),
        )));
    }

    let callback = CallbackContext {
        session_id: session_id.clone(),
        code: query.code,
        access_token: query.access_token,
        provider: query.provider,
    };

    Ok(match controller.handle_provider_callback(callback).await {
        Ok(kind) => ResponseBuilder::redirect(&success_page_path(&session_id, kind.name())),
        Err(e) => {
            LoggingHelper::log_auth_failure("Provider callback", &session_id, &e);
            ResponseBuilder::soft_failure(&e)
        }
    })
}
