// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the credential lifecycle manager.
#[derive(Debug, Clone, clap::Args)]
pub struct AuthConfig {
    /// Base URL of the identity endpoint (`/login`, `/refresh`, `/logout`).
    #[arg(long, default_value = "http://127.0.0.1:8080/auth", env = "ABATTOIR_AUTH_IDENTITY_URL")]
    pub identity_url: String,

    /// Path of the credential file. Defaults to `<state dir>/credentials.json`.
    #[arg(long, env = "ABATTOIR_AUTH_CREDENTIAL_PATH")]
    pub credential_path: Option<PathBuf>,

    /// Seconds before expiry at which a credential counts as expiring soon.
    #[arg(long, default_value_t = 300, env = "ABATTOIR_AUTH_EXPIRY_THRESHOLD_SECS")]
    pub expiry_threshold_secs: u64,

    /// Proactive refresh check interval in milliseconds.
    #[arg(long, default_value_t = 30000, env = "ABATTOIR_AUTH_REFRESH_CHECK_MS")]
    pub refresh_check_ms: u64,

    /// Login request timeout in milliseconds.
    #[arg(long, default_value_t = 15000, env = "ABATTOIR_AUTH_LOGIN_TIMEOUT_MS")]
    pub login_timeout_ms: u64,

    /// Refresh request timeout in milliseconds.
    #[arg(long, default_value_t = 10000, env = "ABATTOIR_AUTH_REFRESH_TIMEOUT_MS")]
    pub refresh_timeout_ms: u64,

    /// Logout notification timeout in milliseconds.
    #[arg(long, default_value_t = 5000, env = "ABATTOIR_AUTH_LOGOUT_TIMEOUT_MS")]
    pub logout_timeout_ms: u64,

    /// Delete the legacy single-token blob once it has been migrated.
    #[arg(long, env = "ABATTOIR_AUTH_REMOVE_LEGACY")]
    pub remove_legacy_after_migration: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity_url: "http://127.0.0.1:8080/auth".to_owned(),
            credential_path: None,
            expiry_threshold_secs: 300,
            refresh_check_ms: 30000,
            login_timeout_ms: 15000,
            refresh_timeout_ms: 10000,
            logout_timeout_ms: 5000,
            remove_legacy_after_migration: false,
        }
    }
}

impl AuthConfig {
    pub fn expiry_threshold(&self) -> Duration {
        Duration::from_secs(self.expiry_threshold_secs)
    }

    pub fn refresh_check_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_check_ms)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn logout_timeout(&self) -> Duration {
        Duration::from_millis(self.logout_timeout_ms)
    }

    pub fn credential_path(&self) -> PathBuf {
        self.credential_path.clone().unwrap_or_else(|| state_dir().join("credentials.json"))
    }
}

/// Resolve the state directory for persisted credentials.
///
/// Checks `ABATTOIR_AUTH_STATE_DIR`, then `$XDG_STATE_HOME/abattoir`,
/// then `$HOME/.local/state/abattoir`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ABATTOIR_AUTH_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("abattoir");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/abattoir");
    }
    PathBuf::from(".abattoir")
}
