#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use editor_auth::{configure_routes, settings::EditorAuthSettings, ServiceContainer, VERSION};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let container = initialize_services()
        .await
        .map_err(|e| std::io::Error::other(format!("{e:#}")))?;

    // Runs for the lifetime of the process
    let _cleanup = container.cleanup_scheduler().spawn();

    start_server(container).await
}

/// Load configuration and wire the handshake services
///
/// # Errors
///
/// Returns an error if:
/// - Settings cannot be loaded
/// - A provider is misconfigured
/// - The bootstrap user cannot be created
async fn initialize_services() -> anyhow::Result<ServiceContainer> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = EditorAuthSettings::load()
        .map_err(|e| anyhow::anyhow!("Failed to load settings: {e}"))?;

    let container =
        ServiceContainer::new(settings).context("Failed to initialize identity providers")?;

    container
        .bootstrap_accounts()
        .await
        .context("Failed to create bootstrap user")?;

    Ok(container)
}

/// Start the handshake server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(container: ServiceContainer) -> std::io::Result<()> {
    let settings = container.settings().clone();
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    let controller = web::Data::new(container.controller().clone());
    let settings_data = web::Data::new(settings.clone());
    let cors_origins = settings.get_cors_origins();

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec!["Content-Type", "Accept"])
            .max_age(3600);

        App::new()
            .app_data(controller.clone())
            .app_data(settings_data.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &EditorAuthSettings) {
    println!("Starting editor authentication service v{VERSION} on http://{bind_address}");
    println!(
        "Session TTL: {}s, cleanup every {}s",
        settings.session.ttl_seconds, settings.session.cleanup_interval_seconds
    );
    println!();
    println!("Editor endpoints:");
    println!("  POST /auth/vscode/init                - Open an authentication session");
    println!("  GET  /auth/vscode/status/{{session_id}} - Poll a session");
    println!("  POST /auth/vscode/login               - Complete a local session");
    println!();
    println!("Browser endpoints:");
    println!("  GET  /login                           - Local sign-in page");
    println!("  GET  /auth/provider/callback          - Identity provider callback");
    println!("  GET  /auth/vscode/success             - Completion page");
    println!();
    println!("System endpoints:");
    println!("  GET  /ping                            - Health check");
    let providers: Vec<&str> = settings
        .get_enabled_providers()
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    println!();
    println!("Identity providers: {}", providers.join(", "));
}
