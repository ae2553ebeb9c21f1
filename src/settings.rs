use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::utils::crypto::generate_random_key;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EditorAuthSettings {
    pub application: ApplicationSettings,
    pub session: SessionSettings,
    pub accounts: AccountSettings,
    pub logging: LoggingSettings,
    pub providers: Vec<ProviderSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Public base URL of this service; empty means derive it from each request
    pub server_address: String,
    pub cors_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub ttl_seconds: u64,
    pub poll_interval_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub id_prefix: String,
    pub default_client_name: String,
    pub default_client_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    pub default_role: String,
    pub default_quota: i64,
    /// Keys secret hashing and external-account secret derivation
    pub secret_pepper: String,
    /// Credential name used for sessions completed by local login
    pub local_credential_name: String,
    /// Optional password account created at startup
    pub bootstrap_username: String,
    pub bootstrap_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub name: String,
    pub display_name: Option<String>,
    pub enabled: bool,
    /// Appended to the session's provider URL to form the browser target
    pub authorization_path: String,
    /// When set, callback codes are exchanged here for an access token
    pub token_path: Option<String>,
    pub userinfo_path: String,
    /// Provider base URLs clients may open sessions against; empty refuses all
    pub allowed_urls: Vec<String>,

    // Direct values (can be overridden by environment variables)
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    // Environment variable names for overrides
    pub client_id_env: Option<String>,
    pub client_secret_env: Option<String>,
    /// Comma-separated list that replaces `allowed_urls`
    pub allowed_urls_env: Option<String>,

    pub request_timeout_seconds: u64,
    /// Name of the credential issued for sessions completed through this provider
    pub credential_name: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            server_address: String::new(),
            cors_origins: "http://localhost:3000,http://localhost:8080".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: 600,
            poll_interval_seconds: 2,
            cleanup_interval_seconds: 300,
            id_prefix: "vscode_auth_".to_string(),
            default_client_name: "VSCode Extension".to_string(),
            default_client_version: "1.0.0".to_string(),
        }
    }
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            default_role: "common".to_string(),
            default_quota: 500_000,
            secret_pepper: String::new(), // Will be generated if empty
            local_credential_name: "VSCode Extension".to_string(),
            bootstrap_username: String::new(),
            bootstrap_password: String::new(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            display_name: None,
            enabled: true,
            authorization_path: "/coder/oauth2/github".to_string(),
            token_path: None,
            userinfo_path: "/api/v2/users/me".to_string(),
            allowed_urls: Vec::new(),
            client_id: None,
            client_secret: None,
            client_id_env: None,
            client_secret_env: None,
            allowed_urls_env: None,
            request_timeout_seconds: 10,
            credential_name: "Coder Integration".to_string(),
        }
    }
}

impl ProviderSettings {
    /// The default `coder` provider
    #[must_use]
    pub fn coder() -> Self {
        Self {
            name: "coder".to_string(),
            display_name: Some("Coder".to_string()),
            allowed_urls_env: Some("CODER_ALLOWED_URLS".to_string()),
            ..Self::default()
        }
    }

    /// Get the client ID, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_client_id(&self) -> Option<String> {
        if let Some(env_var) = &self.client_id_env {
            if let Ok(value) = std::env::var(env_var) {
                return Some(value);
            }
        }
        self.client_id.clone()
    }

    /// Get the client secret, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_client_secret(&self) -> Option<String> {
        if let Some(env_var) = &self.client_secret_env {
            if let Ok(value) = std::env::var(env_var) {
                return Some(value);
            }
        }
        self.client_secret.clone()
    }

    /// Get the allowed provider URLs, checking environment variable first, then falling back to direct values
    #[must_use]
    pub fn get_allowed_urls(&self) -> Vec<String> {
        if let Some(env_var) = &self.allowed_urls_env {
            if let Ok(value) = std::env::var(env_var) {
                return value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
        }
        self.allowed_urls.clone()
    }

    #[must_use]
    pub fn get_display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

impl EditorAuthSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - Settings file cannot be read or parsed
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::initialize_environment()?;

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);
        settings.ensure_default_provider();

        Ok(settings)
    }

    /// Initialize environment and logging
    ///
    /// # Errors
    ///
    /// Returns an error if logger initialization fails
    fn initialize_environment() -> Result<(), Box<dyn std::error::Error>> {
        Self::load_env_file();
        env_logger::try_init()?;
        Ok(())
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `EDITOR_AUTH_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let secrets_dir = std::env::var("EDITOR_AUTH_SECRETS_DIR").ok();
        Self::load_from_paths(Path::new("Settings.toml"), secrets_dir.as_deref().map(Path::new))
    }

    /// Layer `base` and then `secrets_dir/Settings.toml` over the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed
    pub fn load_from_paths(
        base: &Path,
        secrets_dir: Option<&Path>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = Self::default();

        if base.exists() {
            settings = Self::from_toml_file(base)?;
            println!("✓ Loaded base settings from {}", base.display());
        }

        if let Some(secrets_dir) = secrets_dir {
            let secrets_path = secrets_dir.join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_toml_file(&secrets_path)?;
                println!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                println!(
                    "ℹ EDITOR_AUTH_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    fn from_toml_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let toml_content = fs::read_to_string(path)?;
        Ok(basic_toml::from_str(&toml_content)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_account_env_overrides(&mut settings.accounts);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        if let Ok(server_address) = std::env::var("SERVER_ADDRESS") {
            app_settings.server_address = server_address;
        }
        if let Ok(cors_origins) = std::env::var("CORS_ORIGINS") {
            app_settings.cors_origins = cors_origins;
        }
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        Self::apply_numeric_env_override("SESSION_TTL_SECONDS", &mut session_settings.ttl_seconds);
        Self::apply_numeric_env_override(
            "POLL_INTERVAL_SECONDS",
            &mut session_settings.poll_interval_seconds,
        );
        Self::apply_numeric_env_override(
            "CLEANUP_INTERVAL_SECONDS",
            &mut session_settings.cleanup_interval_seconds,
        );
    }

    /// Helper function to apply numeric environment variable overrides
    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    /// Apply environment overrides for account settings, generating a pepper if none is set
    pub fn apply_account_env_overrides(account_settings: &mut AccountSettings) {
        let env_pepper_set = std::env::var("ACCOUNT_SECRET_PEPPER").is_ok_and(|pepper| {
            if pepper.is_empty() {
                false
            } else {
                account_settings.secret_pepper = pepper;
                true
            }
        });

        if let Ok(username) = std::env::var("BOOTSTRAP_USERNAME") {
            account_settings.bootstrap_username = username;
        }
        if let Ok(password) = std::env::var("BOOTSTRAP_PASSWORD") {
            account_settings.bootstrap_password = password;
        }

        if !env_pepper_set && account_settings.secret_pepper.is_empty() {
            account_settings.secret_pepper = generate_random_key();
            Self::warn_about_generated_pepper();
        }
    }

    /// Display warnings about using a generated pepper
    fn warn_about_generated_pepper() {
        eprintln!("⚠️  WARNING: Using auto-generated account secret pepper");
        eprintln!("🔒 For production use, set the ACCOUNT_SECRET_PEPPER environment variable");
        eprintln!("   or configure accounts.secret_pepper in Settings.toml");
        eprintln!("💡 Password hashes will not verify across restarts unless it is explicitly configured");
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Configure the `coder` provider when no provider list was given
    pub fn ensure_default_provider(&mut self) {
        if self.providers.is_empty() {
            self.providers.push(ProviderSettings::coder());
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Get CORS origins as a vector of strings
    #[must_use]
    pub fn get_cors_origins(&self) -> Vec<String> {
        self.application
            .cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Get enabled providers
    #[must_use]
    pub fn get_enabled_providers(&self) -> Vec<&ProviderSettings> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }

    /// Get provider by name
    #[must_use]
    pub fn get_provider(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clean_env_vars() {
        for var in [
            "ACCOUNT_SECRET_PEPPER",
            "SESSION_TTL_SECONDS",
            "POLL_INTERVAL_SECONDS",
            "CLEANUP_INTERVAL_SECONDS",
            "BOOTSTRAP_USERNAME",
            "BOOTSTRAP_PASSWORD",
            "SERVER_ADDRESS",
            "EDITOR_AUTH_SECRETS_DIR",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let settings = EditorAuthSettings::default();
        assert_eq!(settings.session.ttl_seconds, 600);
        assert_eq!(settings.session.poll_interval_seconds, 2);
        assert_eq!(settings.session.id_prefix, "vscode_auth_");
        assert_eq!(settings.accounts.default_quota, 500_000);
        assert_eq!(settings.accounts.secret_pepper, "");
        assert!(settings.application.server_address.is_empty());
        assert!(settings.providers.is_empty());
    }

    #[test]
    fn test_default_provider_is_coder() {
        let mut settings = EditorAuthSettings::default();
        settings.ensure_default_provider();

        let coder = settings.get_provider("coder").unwrap();
        assert!(coder.enabled);
        assert_eq!(coder.authorization_path, "/coder/oauth2/github");
        assert_eq!(coder.userinfo_path, "/api/v2/users/me");
        assert_eq!(coder.credential_name, "Coder Integration");
        assert_eq!(coder.get_display_name(), "Coder");
        assert!(coder.token_path.is_none());
    }

    #[test]
    #[serial]
    fn test_allowed_urls_env_indirection() {
        std::env::remove_var("TEST_CODER_ALLOWED_URLS");
        let coder = ProviderSettings {
            allowed_urls: vec!["https://file.example.com".to_string()],
            allowed_urls_env: Some("TEST_CODER_ALLOWED_URLS".to_string()),
            ..ProviderSettings::coder()
        };
        assert_eq!(coder.get_allowed_urls(), vec!["https://file.example.com"]);

        std::env::set_var(
            "TEST_CODER_ALLOWED_URLS",
            " https://a.example.com, ,https://b.example.com/",
        );
        assert_eq!(
            coder.get_allowed_urls(),
            vec!["https://a.example.com", "https://b.example.com/"]
        );
        std::env::remove_var("TEST_CODER_ALLOWED_URLS");
    }

    #[test]
    #[serial]
    fn test_session_env_overrides() {
        clean_env_vars();
        std::env::set_var("SESSION_TTL_SECONDS", "120");
        std::env::set_var("POLL_INTERVAL_SECONDS", "not-a-number");

        let mut session_settings = SessionSettings::default();
        EditorAuthSettings::apply_session_env_overrides(&mut session_settings);

        assert_eq!(session_settings.ttl_seconds, 120);
        assert_eq!(session_settings.poll_interval_seconds, 2);
        assert_eq!(session_settings.cleanup_interval_seconds, 300);

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_pepper_env_override() {
        clean_env_vars();
        std::env::set_var("ACCOUNT_SECRET_PEPPER", "env-pepper");

        let mut account_settings = AccountSettings {
            secret_pepper: "file-pepper".to_string(),
            ..AccountSettings::default()
        };
        EditorAuthSettings::apply_account_env_overrides(&mut account_settings);
        assert_eq!(account_settings.secret_pepper, "env-pepper");

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_pepper_auto_generation() {
        clean_env_vars();

        let mut first = AccountSettings::default();
        EditorAuthSettings::apply_account_env_overrides(&mut first);
        let mut second = AccountSettings::default();
        EditorAuthSettings::apply_account_env_overrides(&mut second);

        assert!(first.secret_pepper.len() > 40);
        assert_ne!(first.secret_pepper, second.secret_pepper);

        clean_env_vars();
    }

    #[test]
    fn test_toml_layering() {
        let base_dir = tempfile::tempdir().unwrap();
        let secrets_dir = tempfile::tempdir().unwrap();

        let base = base_dir.path().join("Settings.toml");
        fs::write(
            &base,
            "[session]\nttl_seconds = 900\n\n[accounts]\nsecret_pepper = \"base\"\n",
        )
        .unwrap();

        let settings = EditorAuthSettings::load_from_paths(&base, None).unwrap();
        assert_eq!(settings.session.ttl_seconds, 900);
        assert_eq!(settings.session.poll_interval_seconds, 2);
        assert_eq!(settings.accounts.secret_pepper, "base");

        fs::write(
            secrets_dir.path().join("Settings.toml"),
            "[accounts]\nsecret_pepper = \"secret\"\n\n[[providers]]\nname = \"gitlab\"\ntoken_path = \"/oauth/token\"\n",
        )
        .unwrap();

        let settings =
            EditorAuthSettings::load_from_paths(&base, Some(secrets_dir.path())).unwrap();
        // The secrets file replaces the base file wholesale
        assert_eq!(settings.session.ttl_seconds, 600);
        assert_eq!(settings.accounts.secret_pepper, "secret");
        let gitlab = settings.get_provider("gitlab").unwrap();
        assert_eq!(gitlab.token_path.as_deref(), Some("/oauth/token"));
        assert_eq!(gitlab.request_timeout_seconds, 10);
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings =
            EditorAuthSettings::load_from_paths(&dir.path().join("Settings.toml"), Some(dir.path()))
                .unwrap();
        assert_eq!(settings.session.ttl_seconds, 600);
    }

    #[test]
    #[serial]
    fn test_client_secret_env_indirection() {
        std::env::set_var("TEST_CODER_CLIENT_SECRET", "from-env");
        let provider = ProviderSettings {
            client_secret: Some("direct".to_string()),
            client_secret_env: Some("TEST_CODER_CLIENT_SECRET".to_string()),
            ..ProviderSettings::coder()
        };
        assert_eq!(provider.get_client_secret().as_deref(), Some("from-env"));
        assert_eq!(provider.get_client_id(), None);
        std::env::remove_var("TEST_CODER_CLIENT_SECRET");
    }

    #[test]
    fn test_cors_origins_split() {
        let mut settings = EditorAuthSettings::default();
        settings.application.cors_origins = "https://a.example, https://b.example,".to_string();
        assert_eq!(
            settings.get_cors_origins(),
            vec!["https://a.example", "https://b.example"]
        );
    }
}
