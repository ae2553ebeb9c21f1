//! Session identifier generation
//!
//! Identifiers are 16 bytes from the operating system's secure random
//! source, hex encoded behind a namespace prefix. If that source fails the
//! generator degrades to a timestamp-derived id and says so loudly.

use chrono::Utc;
use log::warn;
use rand::rngs::OsRng;
use rand::TryRngCore;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default namespace prefix for session ids
pub const DEFAULT_ID_PREFIX: &str = "vscode_auth_";

/// Bytes of entropy per identifier
pub const SESSION_ID_ENTROPY_BYTES: usize = 16;

/// Disambiguates fallback ids minted within the same nanosecond
static FALLBACK_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct SessionIdGenerator {
    prefix: String,
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_PREFIX)
    }
}

impl SessionIdGenerator {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generate a fresh session id from the OS random source
    #[must_use]
    pub fn generate(&self) -> String {
        self.generate_from(|buf| OsRng.try_fill_bytes(buf).map_err(|e| e.to_string()))
    }

    /// Generate a session id from a caller-supplied entropy source
    ///
    /// A failing source produces a timestamp-derived id; that path is
    /// logged as a degraded-security event.
    pub fn generate_from<F>(&self, fill: F) -> String
    where
        F: FnOnce(&mut [u8]) -> Result<(), String>,
    {
        let mut bytes = [0u8; SESSION_ID_ENTROPY_BYTES];
        match fill(&mut bytes) {
            Ok(()) => format!("{}{}", self.prefix, hex::encode(bytes)),
            Err(e) => {
                let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
                let sequence = FALLBACK_SEQUENCE.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "⚠️  DEGRADED SECURITY: secure random source failed ({e}); issuing timestamp-derived session id"
                );
                format!("{}ts{nanos}_{sequence}", self.prefix)
            }
        }
    }
}
