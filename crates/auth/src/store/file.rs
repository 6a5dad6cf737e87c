// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-file backed store with atomic writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{Change, CredentialStore};

/// Persists every entry to a single JSON object file.
///
/// The file is read once on open; every mutation rewrites it through a
/// temp file + rename so a crash never leaves a torn file behind. A batch
/// passed to [`CredentialStore::apply`] is one rewrite, so related keys
/// always change together on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// logged and treated as empty; the next write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), "ignoring corrupt credential file: {e}");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no credential file yet");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries: Mutex::new(entries) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> anyhow::Result<()> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        f(&mut next);
        save(&self.path, &next)?;
        *entries = next;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.mutate(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn apply(&self, changes: &[Change<'_>]) -> anyhow::Result<()> {
        self.mutate(|entries| {
            for &(key, value) in changes {
                match value {
                    Some(value) => entries.insert(key.to_owned(), value.to_owned()),
                    None => entries.remove(key),
                };
            }
        })
    }
}

/// Write `entries` to `path` atomically (unique tmp file + rename).
///
/// The tmp name carries the PID and a counter so two writers never share a
/// tmp file.
fn save(path: &Path, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(entries)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    let written = std::fs::write(&tmp_path, json).and_then(|()| std::fs::rename(&tmp_path, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    debug!(path = %path.display(), keys = entries.len(), "persisted credential file");
    Ok(())
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
