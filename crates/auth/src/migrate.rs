// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upgrade of sessions persisted by older single-token clients.
//!
//! Older dashboard builds stored one JSON blob under the `session` key:
//!
//! ```json
//! {"token": "<jwt>", "user": {"id": "u-1", "name": "Ada", "role": "supervisor"}}
//! ```
//!
//! Some builds used camel case (`authToken` / `userData`); both are read.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::event::SessionEvent;
use crate::validator::TokenValidator;
use crate::vault::{CredentialPair, Session, SessionVault, UserProfile};

/// Historical single-token session shape.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyCredential {
    #[serde(alias = "authToken", alias = "access_token")]
    pub token: String,
    #[serde(default, alias = "userData", alias = "profile")]
    pub user: Option<UserProfile>,
}

impl LegacyCredential {
    pub fn parse(blob: &str) -> Option<Self> {
        serde_json::from_str(blob).ok().filter(|c: &Self| !c.token.is_empty())
    }
}

pub struct LegacyMigrationAdapter {
    vault: Arc<SessionVault>,
    validator: TokenValidator,
    events: broadcast::Sender<SessionEvent>,
    remove_legacy: bool,
    guard: Mutex<()>,
}

impl LegacyMigrationAdapter {
    pub fn new(
        vault: Arc<SessionVault>,
        validator: TokenValidator,
        events: broadcast::Sender<SessionEvent>,
        remove_legacy: bool,
    ) -> Self {
        Self { vault, validator, events, remove_legacy, guard: Mutex::new(()) }
    }

    /// Transcribe a valid legacy session into the current format.
    ///
    /// Returns `true` only when this call performed a migration. A current
    /// pair already present, a missing or unreadable blob, and an expired
    /// legacy token all return `false`; the last one means a fresh login is
    /// required.
    pub fn migrate_if_present(&self) -> bool {
        let _guard = self.guard.lock();

        match self.vault.pair() {
            Ok(Some(_)) => return false,
            Ok(None) => {}
            Err(e) => {
                warn!(err = %e, "cannot read credential store, skipping legacy migration");
                return false;
            }
        }

        let blob = match self.vault.legacy_blob() {
            Ok(Some(blob)) => blob,
            Ok(None) => return false,
            Err(e) => {
                warn!(err = %e, "cannot read legacy session");
                return false;
            }
        };
        let Some(legacy) = LegacyCredential::parse(&blob) else {
            debug!("legacy session blob is unreadable, ignoring");
            return false;
        };
        let Some(claims) = self.validator.valid_claims(Some(legacy.token.as_str())) else {
            info!("legacy session token is no longer valid, login required");
            return false;
        };

        // The old scheme had one credential; it backs both halves until the
        // first refresh or login replaces it.
        let session = Session {
            pair: CredentialPair {
                access_token: legacy.token.clone(),
                refresh_token: legacy.token,
            },
            profile: legacy.user,
        };
        if let Err(e) = self.vault.write_session(&session) {
            warn!(err = %e, "failed to write migrated session");
            return false;
        }

        if self.remove_legacy {
            if let Err(e) = self.vault.remove_legacy_blob() {
                warn!(err = %e, "failed to remove migrated legacy session");
            }
        }

        info!(subject = %claims.sub, "migrated legacy session");
        let _ = self.events.send(SessionEvent::Migrated { subject: claims.sub });
        true
    }
}

#[cfg(test)]
#[path = "migrate_tests.rs"]
mod tests;
