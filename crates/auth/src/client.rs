// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network side of the lifecycle: login, refresh, logout.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::event::{LogoutReason, SessionEvent};
use crate::validator::TokenValidator;
use crate::vault::{Commit, CredentialPair, Session, SessionVault, UserProfile};

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct LogoutRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default, alias = "user")]
    user_profile: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    /// Present only when the identity endpoint rotates refresh tokens.
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default, alias = "user")]
    user_profile: Option<UserProfile>,
}

/// Install the process-wide rustls provider reqwest is built against.
/// Safe to call repeatedly.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Talks to the identity endpoint and records the results in the vault.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    vault: Arc<SessionVault>,
    validator: TokenValidator,
    events: broadcast::Sender<SessionEvent>,
    login_timeout: Duration,
    refresh_timeout: Duration,
    logout_timeout: Duration,
}

impl AuthClient {
    pub fn new(
        config: &AuthConfig,
        vault: Arc<SessionVault>,
        validator: TokenValidator,
        events: broadcast::Sender<SessionEvent>,
    ) -> anyhow::Result<Self> {
        install_crypto_provider();
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            base_url: config.identity_url.trim_end_matches('/').to_owned(),
            vault,
            validator,
            events,
            login_timeout: config.login_timeout(),
            refresh_timeout: config.refresh_timeout(),
            logout_timeout: config.logout_timeout(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange a username/password for a credential pair and store it.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let resp = self
            .http
            .post(self.url("/login"))
            .timeout(self.login_timeout)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = resp.status();
        if status.is_client_error() {
            debug!(%status, username, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::NetworkError(format!("login failed ({status}): {text}")));
        }

        let body: LoginResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::NetworkError(format!("invalid login response: {e}")))?;

        let claims = self.validator.claims(&body.access_token)?;
        self.validator.claims(&body.refresh_token)?;

        let session = Session {
            pair: CredentialPair {
                access_token: body.access_token,
                refresh_token: body.refresh_token,
            },
            profile: body.user_profile,
        };
        self.vault.write_session(&session)?;

        info!(subject = %claims.sub, "logged in");
        let _ = self.events.send(SessionEvent::LoggedIn { subject: claims.sub });
        Ok(session)
    }

    /// Trade the stored refresh token for a new access token.
    ///
    /// Fails fast with [`AuthError::RefreshTokenInvalid`] when the stored
    /// refresh token is missing or no longer valid. A network failure leaves
    /// the stored pair untouched. Callers should go through
    /// [`crate::single_flight::RefreshCoordinator`] rather than call this
    /// directly.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let started = self.vault.epoch();
        let refresh_token = self
            .vault
            .refresh_token()?
            .filter(|t| self.validator.is_valid(Some(t.as_str())));
        let Some(refresh_token) = refresh_token else {
            debug!("no usable refresh token, skipping network refresh");
            return Err(AuthError::RefreshTokenInvalid);
        };

        let resp = self
            .http
            .post(self.url("/refresh"))
            .timeout(self.refresh_timeout)
            .json(&RefreshRequest { refresh_token: &refresh_token })
            .send()
            .await?;

        let status = resp.status();
        if status.is_client_error() {
            warn!(%status, "refresh token rejected by identity endpoint");
            return Err(AuthError::RefreshTokenInvalid);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::NetworkError(format!("refresh failed ({status}): {text}")));
        }

        let body: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::NetworkError(format!("invalid refresh response: {e}")))?;
        self.validator.claims(&body.access_token)?;
        if let Some(ref rotated) = body.refresh_token {
            self.validator.claims(rotated)?;
        }

        match self.vault.commit_refresh(
            started,
            &body.access_token,
            body.refresh_token.as_deref(),
            body.user_profile.as_ref(),
        )? {
            Commit::Applied => {
                info!(rotated = body.refresh_token.is_some(), "access token refreshed");
                let _ = self.events.send(SessionEvent::Refreshed);
                Ok(body.access_token)
            }
            Commit::Superseded => {
                debug!("session ended while refresh was in flight, discarding result");
                Err(AuthError::RefreshTokenInvalid)
            }
        }
    }

    /// Best-effort server notification, then local teardown.
    pub async fn logout(&self) {
        self.logout_with_reason(LogoutReason::UserRequested, self.vault.epoch()).await;
    }

    /// End the session that was current at `epoch`.
    ///
    /// A login that lands before the local teardown (including one made
    /// while the server is being notified) is a different session and is
    /// left alone. Returns whether a session was ended.
    pub(crate) async fn logout_with_reason(&self, reason: LogoutReason, epoch: u64) -> bool {
        if self.vault.epoch() != epoch {
            debug!(?reason, "session already replaced, skipping logout");
            return false;
        }
        let pair = self.vault.pair().ok().flatten();

        // Dead tokens have nothing left to revoke server-side.
        if reason != LogoutReason::Expired {
            self.notify_logout(pair.as_ref()).await;
        }

        match self.vault.clear_if(epoch) {
            Ok(true) => {}
            Ok(false) => {
                debug!(?reason, "new session started during logout, keeping it");
                return false;
            }
            Err(e) => warn!(err = %e, "failed to clear credential store on logout"),
        }
        info!(?reason, "logged out");
        let _ = self.events.send(SessionEvent::LoggedOut { reason });
        true
    }

    async fn notify_logout(&self, pair: Option<&CredentialPair>) {
        let mut req = self
            .http
            .post(self.url("/logout"))
            .timeout(self.logout_timeout)
            .json(&LogoutRequest { refresh_token: pair.map(|p| p.refresh_token.as_str()) });
        if let Some(p) = pair {
            req = req.bearer_auth(&p.access_token);
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => debug!("identity endpoint acknowledged logout"),
            Ok(resp) => warn!(status = %resp.status(), "identity endpoint refused logout"),
            Err(e) => warn!(err = %e, "logout notification failed"),
        }
    }
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}
