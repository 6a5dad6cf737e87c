// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable key/value storage for credentials.
//!
//! Backends are deliberately dumb: no validation, no knowledge of tokens.
//! Pairing and atomicity live one layer up in [`crate::vault`].

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Key holding the current access token.
pub const ACCESS_TOKEN_KEY: &str = "auth.access_token";
/// Key holding the current refresh token.
pub const REFRESH_TOKEN_KEY: &str = "auth.refresh_token";
/// Key holding the cached user profile (JSON).
pub const USER_PROFILE_KEY: &str = "auth.user_profile";
/// Key of the single-token blob written by older dashboard clients.
pub const LEGACY_SESSION_KEY: &str = "session";

/// Injectable key/value store that survives process restarts.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;

    /// Apply several changes as one write. `Some` sets a key, `None`
    /// removes it.
    ///
    /// Persistent backends override this so the whole batch lands in a
    /// single durable step. The default applies the changes one by one.
    fn apply(&self, changes: &[Change<'_>]) -> anyhow::Result<()> {
        for &(key, value) in changes {
            match value {
                Some(value) => self.set(key, value)?,
                None => self.remove(key)?,
            }
        }
        Ok(())
    }
}

/// One entry of a [`CredentialStore::apply`] batch.
pub type Change<'a> = (&'a str, Option<&'a str>);
