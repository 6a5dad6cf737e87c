// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::claims::SegmentedClaimsDecoder;
use crate::store::{CredentialStore, MemoryStore, LEGACY_SESSION_KEY};
use crate::test_support::{mint_token, ManualClock};

use super::*;

const NOW: i64 = 1_800_000_000;

struct Harness {
    store: Arc<MemoryStore>,
    vault: Arc<SessionVault>,
    adapter: LegacyMigrationAdapter,
    events: broadcast::Receiver<SessionEvent>,
}

fn harness(legacy_blob: Option<String>, remove_legacy: bool) -> Harness {
    let store = Arc::new(match legacy_blob {
        Some(blob) => MemoryStore::with_entries([(LEGACY_SESSION_KEY, blob)]),
        None => MemoryStore::new(),
    });
    let vault = Arc::new(SessionVault::new(store.clone()));
    let validator = TokenValidator::new(
        Arc::new(SegmentedClaimsDecoder::default()),
        Arc::new(ManualClock::new(NOW)),
    );
    let (tx, rx) = broadcast::channel(16);
    let adapter = LegacyMigrationAdapter::new(Arc::clone(&vault), validator, tx, remove_legacy);
    Harness { store, vault, adapter, events: rx }
}

fn legacy_blob(token: &str) -> String {
    serde_json::json!({
        "token": token,
        "user": { "id": "u-9", "name": "Grace", "role": "yard_manager", "facility": "east" },
    })
    .to_string()
}

#[test]
fn migrates_valid_legacy_session() -> anyhow::Result<()> {
    let token = mint_token("u-9", NOW + 3600);
    let mut h = harness(Some(legacy_blob(&token)), false);

    assert!(h.adapter.migrate_if_present());

    let pair = h.vault.pair()?.expect("pair after migration");
    assert_eq!(pair.access_token, token);
    assert_eq!(pair.refresh_token, token);
    let profile = h.vault.profile()?.expect("profile after migration");
    assert_eq!(profile.name, "Grace");
    assert_eq!(profile.facility.as_deref(), Some("east"));
    assert_eq!(h.events.try_recv()?, SessionEvent::Migrated { subject: "u-9".to_owned() });
    // Blob kept by default.
    assert!(h.store.get(LEGACY_SESSION_KEY)?.is_some());
    Ok(())
}

#[test]
fn second_call_is_a_noop() -> anyhow::Result<()> {
    let token = mint_token("u-9", NOW + 3600);
    let h = harness(Some(legacy_blob(&token)), false);

    assert!(h.adapter.migrate_if_present());
    let epoch = h.vault.epoch();
    let pair = h.vault.pair()?;

    assert!(!h.adapter.migrate_if_present());
    assert_eq!(h.vault.epoch(), epoch);
    assert_eq!(h.vault.pair()?, pair);
    Ok(())
}

#[test]
fn existing_pair_is_never_overwritten() -> anyhow::Result<()> {
    let h = harness(Some(legacy_blob(&mint_token("old", NOW + 3600))), false);
    h.vault.write_session(&Session {
        pair: CredentialPair { access_token: "a".to_owned(), refresh_token: "r".to_owned() },
        profile: None,
    })?;

    assert!(!h.adapter.migrate_if_present());
    assert_eq!(h.vault.access_token()?.as_deref(), Some("a"));
    Ok(())
}

#[test]
fn expired_legacy_token_is_not_migrated() -> anyhow::Result<()> {
    let h = harness(Some(legacy_blob(&mint_token("u-9", NOW - 1))), false);
    assert!(!h.adapter.migrate_if_present());
    assert_eq!(h.vault.pair()?, None);
    Ok(())
}

#[yare::parameterized(
    not_json = { "not json".to_owned() },
    no_token = { r#"{"user":{"name":"x"}}"#.to_owned() },
    empty_token = { r#"{"token":""}"#.to_owned() },
    malformed_token = { r#"{"token":"opaque-session-id"}"#.to_owned() },
)]
fn unusable_blob_is_ignored(blob: String) {
    let h = harness(Some(blob), false);
    assert!(!h.adapter.migrate_if_present());
}

#[test]
fn camel_case_blob_is_accepted() -> anyhow::Result<()> {
    let token = mint_token("u-3", NOW + 60);
    let blob = serde_json::json!({ "authToken": token, "userData": { "username": "kim" } });
    let h = harness(Some(blob.to_string()), false);

    assert!(h.adapter.migrate_if_present());
    assert_eq!(h.vault.profile()?.map(|p| p.name), Some("kim".to_owned()));
    Ok(())
}

#[test]
fn blob_without_user_migrates_without_profile() -> anyhow::Result<()> {
    let token = mint_token("u-3", NOW + 60);
    let h = harness(Some(serde_json::json!({ "token": token }).to_string()), false);

    assert!(h.adapter.migrate_if_present());
    assert_eq!(h.vault.profile()?, None);
    Ok(())
}

#[test]
fn removes_blob_when_configured() -> anyhow::Result<()> {
    let h = harness(Some(legacy_blob(&mint_token("u-9", NOW + 3600))), true);
    assert!(h.adapter.migrate_if_present());
    assert_eq!(h.store.get(LEGACY_SESSION_KEY)?, None);
    Ok(())
}

#[test]
fn nothing_to_migrate() {
    let h = harness(None, false);
    assert!(!h.adapter.migrate_if_present());
}
