// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session service the rest of the dashboard depends on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Request;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use crate::claims::ClaimsDecoder;
use crate::client::{install_crypto_provider, AuthClient};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::event::{LogoutReason, SessionEvent};
use crate::gateway::{attach_bearer, RequestGateway};
use crate::migrate::LegacyMigrationAdapter;
use crate::scheduler::RefreshScheduler;
use crate::single_flight::RefreshCoordinator;
use crate::store::CredentialStore;
use crate::validator::TokenValidator;
use crate::vault::{Session, SessionVault, UserProfile};

const EVENT_CAPACITY: usize = 64;

/// What feature code needs from the session, and nothing more.
#[async_trait]
pub trait SessionAuth: Send + Sync {
    /// Set the bearer header on `req` if a valid access token is stored.
    fn attach(&self, req: &mut Request) -> bool;

    async fn is_authenticated(&self) -> bool;

    /// Cached profile of the signed-in user, if any.
    fn current_user(&self) -> Option<UserProfile>;

    fn is_expiring_soon(&self) -> bool;

    async fn logout(&self);
}

/// Where the session sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Valid,
    ExpiringSoon,
}

/// Point-in-time view of the session for UI and CLI display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub user: Option<UserProfile>,
    pub access_expires_in_secs: u64,
    pub refresh_expires_in_secs: u64,
    pub refreshing: bool,
}

pub struct TokenManager {
    config: AuthConfig,
    http: reqwest::Client,
    vault: Arc<SessionVault>,
    validator: TokenValidator,
    client: Arc<AuthClient>,
    coordinator: Arc<RefreshCoordinator>,
    migrator: Arc<LegacyMigrationAdapter>,
    events: broadcast::Sender<SessionEvent>,
}

impl TokenManager {
    /// Wire up a manager over `store`.
    ///
    /// Fails only if an HTTP client cannot be built, e.g. when the TLS
    /// backend has no usable configuration.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        decoder: Arc<dyn ClaimsDecoder>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> anyhow::Result<Self> {
        install_crypto_provider();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let vault = Arc::new(SessionVault::new(store));
        let validator = TokenValidator::new(decoder, clock);
        let client = Arc::new(AuthClient::new(
            &config,
            Arc::clone(&vault),
            validator.clone(),
            events.clone(),
        )?);
        let coordinator = Arc::new(RefreshCoordinator::new(Arc::clone(&client)));
        let migrator = Arc::new(LegacyMigrationAdapter::new(
            Arc::clone(&vault),
            validator.clone(),
            events.clone(),
            config.remove_legacy_after_migration,
        ));

        Ok(Self {
            config,
            http: reqwest::Client::builder().build()?,
            vault,
            validator,
            client,
            coordinator,
            migrator,
            events,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        self.client.login(username, password).await
    }

    /// Explicit refresh, shared with any refresh already in flight.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        self.coordinator.refresh().await
    }

    pub fn state(&self) -> SessionState {
        let access = self.vault.access_token().ok().flatten();
        if !self.validator.is_valid(access.as_deref()) {
            SessionState::Unauthenticated
        } else if self.validator.is_expiring_soon(access.as_deref(), self.config.expiry_threshold())
        {
            SessionState::ExpiringSoon
        } else {
            SessionState::Valid
        }
    }

    pub fn time_until_expiry(&self) -> Duration {
        let access = self.vault.access_token().ok().flatten();
        self.validator.time_until_expiry(access.as_deref())
    }

    pub fn status(&self) -> SessionStatus {
        let refresh = self.vault.refresh_token().ok().flatten();
        SessionStatus {
            state: self.state(),
            user: self.current_user(),
            access_expires_in_secs: self.time_until_expiry().as_secs(),
            refresh_expires_in_secs: self.validator.time_until_expiry(refresh.as_deref()).as_secs(),
            refreshing: self.coordinator.is_refreshing(),
        }
    }

    /// Gateway for API calls on this session, using `http` for transport.
    pub fn gateway_with(&self, http: reqwest::Client) -> RequestGateway {
        RequestGateway::new(
            http,
            Arc::clone(&self.vault),
            self.validator.clone(),
            Arc::clone(&self.coordinator),
            Arc::clone(&self.client),
        )
    }

    pub fn gateway(&self) -> RequestGateway {
        self.gateway_with(self.http.clone())
    }

    pub fn scheduler(&self) -> RefreshScheduler {
        RefreshScheduler::new(
            Arc::clone(&self.vault),
            self.validator.clone(),
            Arc::clone(&self.coordinator),
            Arc::clone(&self.client),
            self.events.clone(),
            self.config.refresh_check_interval(),
            self.config.expiry_threshold(),
        )
    }

    pub fn migrator(&self) -> Arc<LegacyMigrationAdapter> {
        Arc::clone(&self.migrator)
    }
}

#[async_trait]
impl SessionAuth for TokenManager {
    fn attach(&self, req: &mut Request) -> bool {
        attach_bearer(&self.vault, &self.validator, req).is_some()
    }

    async fn is_authenticated(&self) -> bool {
        self.migrator.migrate_if_present();

        let epoch = self.vault.epoch();
        let Ok(pair) = self.vault.pair() else {
            return false;
        };
        let Some(pair) = pair else {
            return false;
        };
        if self.validator.is_valid(Some(pair.access_token.as_str()))
            || self.validator.is_valid(Some(pair.refresh_token.as_str()))
        {
            return true;
        }

        info!("stored session expired, clearing");
        self.client.logout_with_reason(LogoutReason::Expired, epoch).await;
        false
    }

    fn current_user(&self) -> Option<UserProfile> {
        self.vault.profile().ok().flatten()
    }

    fn is_expiring_soon(&self) -> bool {
        let access = self.vault.access_token().ok().flatten();
        self.validator.is_expiring_soon(access.as_deref(), self.config.expiry_threshold())
    }

    async fn logout(&self) {
        self.client.logout().await;
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("identity_url", &self.config.identity_url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
