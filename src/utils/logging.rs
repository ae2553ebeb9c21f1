// Centralized logging for the handshake lifecycle
use log::{debug, error, info, warn};

use crate::models::{AuthError, ProviderKind};

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log provider registry initialization start
    pub fn log_provider_initialization() {
        info!("🔧 Initializing identity providers from configuration...");
    }

    /// Log that a provider is disabled
    pub fn log_provider_disabled(provider_name: &str) {
        info!("⏭️  Provider {provider_name} is disabled, skipping");
    }

    /// Log that a provider is configured
    pub fn log_provider_configured(display_name: &str, provider_name: &str, exchanges_code: bool) {
        let mode = if exchanges_code {
            "code exchange"
        } else {
            "token passthrough"
        };
        info!("✅ {display_name} identity provider configured ({provider_name}, {mode})");
    }

    /// Log summary of configured providers
    pub fn log_providers_summary(provider_names: &[&str]) {
        info!("🎯 Configured identity providers: {provider_names:?}");
    }

    pub fn log_session_opened(session_id: &str, provider: &ProviderKind, client_name: &str) {
        info!("🆕 Created auth session {session_id} for {client_name} (provider: {provider})");
    }

    pub fn log_session_completed(session_id: &str, provider: &ProviderKind, username: &str) {
        info!("✅ Completed auth session {session_id} for user {username} (provider: {provider})");
    }

    pub fn log_credential_delivered(session_id: &str) {
        info!("📦 Delivered credential for auth session {session_id}; session consumed");
    }

    /// Log a failed handshake step at a level matching how surprising it is
    pub fn log_auth_failure(operation: &str, session_id: &str, err: &AuthError) {
        match err {
            AuthError::SessionNotFound | AuthError::Validation(_) | AuthError::InvalidCredentials => {
                debug!("{operation} for session {session_id}: {err}");
            }
            AuthError::ProviderMismatch { .. } => {
                warn!("⚠️  {operation} for session {session_id}: {err}");
            }
            AuthError::ProviderUnavailable(_) | AuthError::InternalStorage(_) => {
                error!("❌ {operation} for session {session_id} failed: {err}");
            }
        }
    }

    pub fn log_sweep_result(removed: usize) {
        if removed > 0 {
            info!("🧹 Cleaned up {removed} expired auth sessions");
        } else {
            debug!("Cleanup sweep found no expired auth sessions");
        }
    }
}
