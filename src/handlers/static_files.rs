use super::helpers::escape_html;
use crate::models::api::SuccessPageQuery;
use crate::models::{HealthResponse, LOCAL_PROVIDER};
use crate::settings::EditorAuthSettings;
use crate::utils::responses::ResponseBuilder;
use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;

/// Health check endpoint
///
/// # Errors
/// Returns an error if health status cannot be determined
pub async fn health() -> Result<HttpResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        message: "Editor authentication service is running".to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginPageQuery {
    pub session_id: Option<String>,
}

/// `GET /login`: password form for local sessions
pub async fn login_page(query: web::Query<LoginPageQuery>) -> Result<HttpResponse> {
    let session_id = query.into_inner().session_id.unwrap_or_default();
    Ok(ResponseBuilder::html(render_login_page(&session_id)))
}

/// `GET /auth/vscode/success`: tells the user to return to the editor
pub async fn success_page(
    query: web::Query<SuccessPageQuery>,
    settings: web::Data<EditorAuthSettings>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let provider = query.provider.unwrap_or_else(|| LOCAL_PROVIDER.to_string());
    let via = if provider == LOCAL_PROVIDER {
        None
    } else {
        Some(
            settings
                .get_provider(&provider)
                .map_or(provider.as_str(), |p| p.get_display_name())
                .to_string(),
        )
    };
    Ok(ResponseBuilder::html(render_success_page(
        query.session_id.as_deref().unwrap_or_default(),
        via.as_deref(),
    )))
}

fn render_login_page(session_id: &str) -> String {
    let session_id = escape_html(session_id);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Sign In - Editor</title>
    <style>{styles}</style>
</head>
<body>
    <div class="container">
        <div class="login-box">
            <h1>Sign In</h1>
            <p>Sign in to connect your editor</p>
            <form id="login-form">
                <input type="hidden" name="sessionId" value="{session_id}">
                <input type="text" name="username" placeholder="Username" autocomplete="username" required>
                <input type="password" name="password" placeholder="Password" autocomplete="current-password" required>
                <button type="submit">Continue</button>
            </form>
            <p id="login-error" class="error"></p>
        </div>
    </div>
    <script>
        document.getElementById('login-form').addEventListener('submit', async (event) => {{
            event.preventDefault();
            const form = new FormData(event.target);
            const response = await fetch('/auth/vscode/login', {{
                method: 'POST',
                headers: {{ 'Content-Type': 'application/json' }},
                body: JSON.stringify(Object.fromEntries(form.entries())),
            }});
            const result = await response.json();
            if (result.success) {{
                window.location.href = result.data.redirectUrl;
            }} else {{
                document.getElementById('login-error').textContent = result.message || 'Sign in failed';
            }}
        }});
    </script>
</body>
</html>"#,
        styles = page_styles(),
        session_id = session_id
    )
}

fn render_success_page(session_id: &str, via: Option<&str>) -> String {
    let detail = via.map_or_else(
        || "You are signed in.".to_string(),
        |name| format!("You are signed in with {}.", escape_html(name)),
    );
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Authentication Complete</title>
    <style>{styles}</style>
</head>
<body>
    <div class="container">
        <div class="login-box">
            <h1>Authentication Complete</h1>
            <p>{detail}</p>
            <p>You can close this window and return to your editor.</p>
            <p class="session">Session {session_id}</p>
        </div>
    </div>
</body>
</html>"#,
        styles = page_styles(),
        detail = detail,
        session_id = escape_html(session_id)
    )
}

const fn page_styles() -> &'static str {
    r"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
            background: linear-gradient(135deg, #f5f7fa 0%, #c3cfe2 100%);
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }
        .container { width: 100%; max-width: 400px; }
        .login-box {
            background: white;
            border-radius: 10px;
            box-shadow: 0 14px 28px rgba(0,0,0,0.12), 0 10px 10px rgba(0,0,0,0.08);
            padding: 40px;
        }
        h1 { color: #333; font-size: 26px; text-align: center; margin-bottom: 10px; }
        p { color: #666; text-align: center; margin-bottom: 16px; }
        form { display: flex; flex-direction: column; gap: 12px; }
        input { padding: 10px 12px; border: 1px solid #ccd; border-radius: 6px; font-size: 15px; }
        button {
            padding: 12px 20px;
            border: none;
            border-radius: 6px;
            background: #6366f1;
            color: white;
            font-size: 16px;
            cursor: pointer;
        }
        button:hover { background: #5558e3; }
        .error { color: #c0392b; margin-top: 12px; }
        .session { color: #999; font-size: 12px; }
    "
}
