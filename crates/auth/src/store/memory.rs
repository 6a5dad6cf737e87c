// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{Change, CredentialStore};

/// In-process store. Nothing survives a restart; used by tests and
/// short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate entries, e.g. to simulate state left by an older client.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { entries: RwLock::new(map) }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn apply(&self, changes: &[Change<'_>]) -> anyhow::Result<()> {
        let mut entries = self.entries.write();
        for &(key, value) in changes {
            match value {
                Some(value) => entries.insert(key.to_owned(), value.to_owned()),
                None => entries.remove(key),
            };
        }
        Ok(())
    }
}
