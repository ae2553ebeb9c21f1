// HTTP request handlers for the editor authentication handshake
pub mod callback;
pub mod helpers;
pub mod static_files;
pub mod vscode;


use actix_web::web;

// Re-export the main handler functions
pub use callback::provider_callback;
pub use static_files::{health, login_page, success_page};
pub use vscode::{auth_status, init_auth, local_login, missing_session_id};

/// Mount every handshake route
///
/// Expects `web::Data<AuthSessionController>` and
/// `web::Data<EditorAuthSettings>` to be registered on the app.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/vscode/init", web::post().to(init_auth))
        .route("/auth/vscode/status", web::get().to(missing_session_id))
        .route("/auth/vscode/status/", web::get().to(missing_session_id))
        .route("/auth/vscode/status/{session_id}", web::get().to(auth_status))
        .route("/auth/vscode/login", web::post().to(local_login))
        .route("/auth/vscode/success", web::get().to(success_page))
        .route("/auth/provider/callback", web::get().to(provider_callback))
        .route("/login", web::get().to(login_page))
        .route("/ping", web::get().to(health));
}
