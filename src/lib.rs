#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the editor-auth application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod accounts;
pub mod container;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod session;
pub mod settings;
pub mod utils;

/// Re-export commonly used items
pub use container::{ServiceConfigBuilder, ServiceContainer};
pub use handlers::configure_routes;
pub use models::{AuthError, AuthSession, ProviderKind, SessionStatus};
pub use session::{AuthSessionController, CleanupScheduler, InMemorySessionStore, SessionStore};
pub use settings::EditorAuthSettings;
