// Helper functions shared by the handshake handlers
use crate::settings::EditorAuthSettings;
use actix_web::HttpRequest;
use once_cell::sync::Lazy;
use regex::Regex;

/// Shape of anything that could be a session id; rejects junk before it reaches the store
static SESSION_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-]{1,128}$").unwrap()
});

/// Public base URL of this service
///
/// The configured `server_address` wins; otherwise it is derived from the
/// request's scheme and host.
#[must_use]
pub fn server_base_url(settings: &EditorAuthSettings, req: &HttpRequest) -> String {
    let configured = settings.application.server_address.trim();
    if !configured.is_empty() {
        return configured.trim_end_matches('/').to_string();
    }

    let connection = req.connection_info();
    format!("{}://{}", connection.scheme(), connection.host())
}

#[must_use]
pub fn is_plausible_session_id(session_id: &str) -> bool {
    SESSION_ID_PATTERN.is_match(session_id)
}

/// Address of the human-facing success page for a session
#[must_use]
pub fn success_page_path(session_id: &str, provider: &str) -> String {
    format!(
        "/auth/vscode/success?session_id={}&provider={}",
        urlencoding::encode(session_id),
        urlencoding::encode(provider)
    )
}

/// Escape text for inclusion in HTML
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_server_base_url_prefers_configuration() {
        let mut settings = EditorAuthSettings::default();
        settings.application.server_address = "https://api.example.com/".to_string();
        let req = TestRequest::default()
            .insert_header(("Host", "internal:8080"))
            .to_http_request();
        assert_eq!(server_base_url(&settings, &req), "https://api.example.com");
    }

    #[test]
    fn test_server_base_url_from_request() {
        let settings = EditorAuthSettings::default();
        let req = TestRequest::default()
            .insert_header(("Host", "auth.example.com:8443"))
            .to_http_request();
        assert_eq!(server_base_url(&settings, &req), "http://auth.example.com:8443");
    }

    #[test]
    fn test_session_id_shape() {
        assert!(is_plausible_session_id("vscode_auth_0123abcd"));
        assert!(!is_plausible_session_id(""));
        assert!(!is_plausible_session_id("../etc/passwd"));
        assert!(!is_plausible_session_id(&"a".repeat(129)));
    }

    #[test]
    fn test_success_page_path_encodes() {
        assert_eq!(
            success_page_path("id 1", "coder"),
            "/auth/vscode/success?session_id=id%201&provider=coder"
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
    }
}
