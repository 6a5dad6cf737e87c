// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Paired credential reads and writes on top of a [`CredentialStore`].
//!
//! Every operation that touches the access/refresh pair goes through one
//! lock, so a reader never sees the access token of one operation next to
//! the refresh token of another. Each write is handed to the store as a
//! single batch, so a persistent store never holds half a pair either.
//!
//! The session epoch is bumped by every login write and every clear.
//! Refresh commits and refresh-driven logouts only land if the epoch they
//! started under is still current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AuthError;
use crate::store::{
    Change, CredentialStore, ACCESS_TOKEN_KEY, LEGACY_SESSION_KEY, REFRESH_TOKEN_KEY,
    USER_PROFILE_KEY,
};

const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_PROFILE_KEY];

/// Access token + refresh token. Always stored and cleared together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Cached attributes of the signed-in principal. Not authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, alias = "user_id")]
    pub id: String,
    #[serde(default, alias = "username")]
    pub name: String,
    #[serde(default)]
    pub role: String,
    /// Facility (tenant) the user is affiliated with.
    #[serde(default, alias = "facility_id", skip_serializing_if = "Option::is_none")]
    pub facility: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Pair plus profile, as produced by login or migration.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub pair: CredentialPair,
    pub profile: Option<UserProfile>,
}

/// Outcome of [`SessionVault::commit_refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Applied,
    /// The session was cleared or replaced while the refresh was in flight.
    Superseded,
}

pub struct SessionVault {
    store: Arc<dyn CredentialStore>,
    gate: RwLock<()>,
    epoch: AtomicU64,
}

impl SessionVault {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store, gate: RwLock::new(()), epoch: AtomicU64::new(0) }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        self.store.get(key).map_err(AuthError::store)
    }

    /// Current pair. A half-present pair is invalid and reads as absent.
    pub fn pair(&self) -> Result<Option<CredentialPair>, AuthError> {
        let _gate = self.gate.read();
        let access = self.get(ACCESS_TOKEN_KEY)?;
        let refresh = self.get(REFRESH_TOKEN_KEY)?;
        match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => {
                Ok(Some(CredentialPair { access_token, refresh_token }))
            }
            (None, None) => Ok(None),
            _ => {
                warn!("ignoring partial credential pair in store");
                Ok(None)
            }
        }
    }

    pub fn access_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.pair()?.map(|p| p.access_token))
    }

    pub fn refresh_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.pair()?.map(|p| p.refresh_token))
    }

    /// Cached profile; an unparseable cache entry reads as absent.
    pub fn profile(&self) -> Result<Option<UserProfile>, AuthError> {
        let _gate = self.gate.read();
        let Some(raw) = self.get(USER_PROFILE_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                warn!("ignoring unreadable cached user profile: {e}");
                Ok(None)
            }
        }
    }

    /// Replace the whole session (login and migration path).
    pub fn write_session(&self, session: &Session) -> Result<(), AuthError> {
        let _gate = self.gate.write();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let profile = session
            .profile
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(AuthError::store)?;

        self.apply_locked(&[
            (ACCESS_TOKEN_KEY, Some(session.pair.access_token.as_str())),
            (REFRESH_TOKEN_KEY, Some(session.pair.refresh_token.as_str())),
            (USER_PROFILE_KEY, profile.as_deref()),
        ])
    }

    /// Apply a refresh result if the session it started under is still
    /// current. `refresh_token` is `Some` only when the server rotated it.
    pub fn commit_refresh(
        &self,
        started_epoch: u64,
        access_token: &str,
        refresh_token: Option<&str>,
        profile: Option<&UserProfile>,
    ) -> Result<Commit, AuthError> {
        let _gate = self.gate.write();
        if self.epoch() != started_epoch || self.get(REFRESH_TOKEN_KEY)?.is_none() {
            return Ok(Commit::Superseded);
        }

        let profile = profile.map(serde_json::to_string).transpose().map_err(AuthError::store)?;
        let mut changes: Vec<Change<'_>> = vec![(ACCESS_TOKEN_KEY, Some(access_token))];
        if let Some(rotated) = refresh_token {
            changes.push((REFRESH_TOKEN_KEY, Some(rotated)));
        }
        if let Some(json) = profile.as_deref() {
            changes.push((USER_PROFILE_KEY, Some(json)));
        }
        self.apply_locked(&changes)?;
        Ok(Commit::Applied)
    }

    /// Drop the session. Any refresh started before this call is discarded.
    pub fn clear(&self) -> Result<(), AuthError> {
        let _gate = self.gate.write();
        self.clear_locked()
    }

    /// Drop the session only if no login or clear happened since `epoch`
    /// was read. Returns whether anything was cleared.
    pub fn clear_if(&self, epoch: u64) -> Result<bool, AuthError> {
        let _gate = self.gate.write();
        if self.epoch() != epoch {
            return Ok(false);
        }
        self.clear_locked()?;
        Ok(true)
    }

    fn clear_locked(&self) -> Result<(), AuthError> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let removals: [Change<'_>; 3] = SESSION_KEYS.map(|key| (key, None));
        self.store.apply(&removals).map_err(AuthError::store)
    }

    /// Raw legacy single-token blob, if an older client left one.
    pub fn legacy_blob(&self) -> Result<Option<String>, AuthError> {
        self.get(LEGACY_SESSION_KEY)
    }

    pub fn remove_legacy_blob(&self) -> Result<(), AuthError> {
        self.store.remove(LEGACY_SESSION_KEY).map_err(AuthError::store)
    }

    /// Hand `changes` to the store as one batch. A store without atomic
    /// batches may fail halfway; the session is then removed rather than
    /// left half-written.
    fn apply_locked(&self, changes: &[Change<'_>]) -> Result<(), AuthError> {
        let Err(e) = self.store.apply(changes) else {
            return Ok(());
        };
        for key in SESSION_KEYS {
            if let Err(e) = self.store.remove(key) {
                warn!(key, "failed to roll back partial credential write: {e:#}");
            }
        }
        Err(AuthError::store(e))
    }
}

impl std::fmt::Debug for SessionVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVault").field("epoch", &self.epoch()).finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "vault_tests.rs"]
mod tests;
