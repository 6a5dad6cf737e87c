// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};

use super::*;
use crate::test_support::{mint_token, mint_with_payload};

#[test]
fn decodes_exp_and_sub() -> anyhow::Result<()> {
    let claims = SegmentedClaimsDecoder::default().decode(&mint_token("inspector-7", 1_900_000_000))?;
    assert_eq!(claims.exp, 1_900_000_000);
    assert_eq!(claims.sub, "inspector-7");
    assert!(claims.extra.is_empty());
    Ok(())
}

#[test]
fn keeps_unknown_claims_and_numeric_subject() -> anyhow::Result<()> {
    let token = mint_with_payload(&serde_json::json!({
        "sub": 42,
        "exp": 100,
        "facility": "north-yard",
    }));
    let claims = SegmentedClaimsDecoder::default().decode(&token)?;
    assert_eq!(claims.sub, "42");
    assert_eq!(claims.extra.get("facility"), Some(&serde_json::json!("north-yard")));
    Ok(())
}

#[test]
fn tolerates_padded_payload() -> anyhow::Result<()> {
    let payload = URL_SAFE.encode(r#"{"sub":"a","exp":1}"#);
    let claims = SegmentedClaimsDecoder::default().decode(&format!("h.{payload}.s"))?;
    assert_eq!(claims.sub, "a");
    Ok(())
}

#[test]
fn custom_delimiter() -> anyhow::Result<()> {
    let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"a","exp":5}"#);
    let claims = SegmentedClaimsDecoder::new(':').decode(&format!("h:{payload}:s"))?;
    assert_eq!(claims.exp, 5);
    Ok(())
}

#[yare::parameterized(
    empty = { String::new() },
    one_segment = { "opaque".to_owned() },
    two_segments = { "a.b".to_owned() },
    four_segments = { "a.b.c.d".to_owned() },
    empty_signature = { format!("h.{}.", URL_SAFE_NO_PAD.encode(r#"{"sub":"a","exp":1}"#)) },
    bad_base64 = { "h.!!!.s".to_owned() },
    not_json = { format!("h.{}.s", URL_SAFE_NO_PAD.encode("hello")) },
    missing_exp = { format!("h.{}.s", URL_SAFE_NO_PAD.encode(r#"{"sub":"a"}"#)) },
    missing_sub = { format!("h.{}.s", URL_SAFE_NO_PAD.encode(r#"{"exp":1}"#)) },
    array_payload = { format!("h.{}.s", URL_SAFE_NO_PAD.encode("[1,2]")) },
)]
fn rejects_as_malformed(token: String) {
    assert_eq!(SegmentedClaimsDecoder::default().decode(&token), Err(AuthError::Malformed));
}
