// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proactive refresh of credentials approaching expiry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::AuthClient;
use crate::error::AuthError;
use crate::event::{LogoutReason, SessionEvent};
use crate::single_flight::RefreshCoordinator;
use crate::validator::TokenValidator;
use crate::vault::SessionVault;

/// What a single scheduler check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session, or the access token is not close to expiry.
    Idle,
    Refreshed,
    /// Transient failure; the session is kept and the next tick retries.
    Deferred(AuthError),
    /// The refresh token is unusable; the session was ended.
    LoggedOut,
    /// A logout or new login replaced the session while the refresh ran.
    Superseded,
}

/// Periodically renews an access token that is about to expire, whether
/// or not any request is in flight. A login or migration triggers an
/// immediate check, so a session that starts close to expiry does not wait
/// for the next tick.
pub struct RefreshScheduler {
    vault: Arc<SessionVault>,
    validator: TokenValidator,
    coordinator: Arc<RefreshCoordinator>,
    client: Arc<AuthClient>,
    events: broadcast::Sender<SessionEvent>,
    interval: Duration,
    threshold: Duration,
}

impl RefreshScheduler {
    pub fn new(
        vault: Arc<SessionVault>,
        validator: TokenValidator,
        coordinator: Arc<RefreshCoordinator>,
        client: Arc<AuthClient>,
        events: broadcast::Sender<SessionEvent>,
        interval: Duration,
        threshold: Duration,
    ) -> Self {
        Self { vault, validator, coordinator, client, events, interval, threshold }
    }

    /// Run one check.
    pub async fn tick(&self) -> TickOutcome {
        let epoch = self.vault.epoch();
        let access = self.vault.access_token().ok().flatten();
        if !self.validator.is_expiring_soon(access.as_deref(), self.threshold) {
            return TickOutcome::Idle;
        }

        let remaining = self.validator.time_until_expiry(access.as_deref());
        debug!(remaining_secs = remaining.as_secs(), "access token expiring soon, refreshing");

        match self.coordinator.refresh().await {
            Ok(_) => TickOutcome::Refreshed,
            Err(e) if self.vault.epoch() != epoch => {
                debug!(err = %e, "session replaced while refreshing, nothing to do");
                TickOutcome::Superseded
            }
            Err(AuthError::RefreshTokenInvalid) => {
                let _ = self.events.send(SessionEvent::RefreshFailed {
                    error: AuthError::RefreshTokenInvalid.to_string(),
                });
                warn!("refresh token no longer valid, ending session");
                if self.client.logout_with_reason(LogoutReason::RefreshFailed, epoch).await {
                    TickOutcome::LoggedOut
                } else {
                    TickOutcome::Superseded
                }
            }
            Err(e) => {
                warn!(err = %e, "proactive refresh failed, will retry next tick");
                let _ = self.events.send(SessionEvent::RefreshFailed { error: e.to_string() });
                TickOutcome::Deferred(e)
            }
        }
    }

    /// Tick every interval, and after every login or migration, until
    /// `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "refresh scheduler started");
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut events = self.events.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
                event = events.recv() => match event {
                    Ok(SessionEvent::LoggedIn { .. } | SessionEvent::Migrated { .. }) => {
                        debug!("new session, checking expiry now");
                    }
                    Ok(_) => continue,
                    // Missed events only matter for their trigger; check now.
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
            self.tick().await;
        }
        info!("refresh scheduler stopped");
    }

    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
