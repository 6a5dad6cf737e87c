// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::*;
use crate::claims::SegmentedClaimsDecoder;
use crate::test_support::{mint_token, ManualClock};

const NOW: i64 = 1_800_000_000;

fn validator() -> (TokenValidator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(NOW));
    let v = TokenValidator::new(Arc::new(SegmentedClaimsDecoder::default()), clock.clone());
    (v, clock)
}

#[test]
fn absent_and_malformed_tokens_are_invalid() {
    let (v, _) = validator();
    assert!(!v.is_valid(None));
    assert!(!v.is_valid(Some("garbage")));
    assert!(!v.is_expiring_soon(Some("garbage"), DEFAULT_EXPIRY_THRESHOLD));
    assert_eq!(v.time_until_expiry(None), Duration::ZERO);
    assert_eq!(v.time_until_expiry(Some("garbage")), Duration::ZERO);
}

#[test]
fn token_expiring_exactly_now_is_invalid() {
    let (v, _) = validator();
    let token = mint_token("u", NOW);
    assert!(!v.is_valid(Some(token.as_str())));
    assert!(!v.is_expiring_soon(Some(token.as_str()), DEFAULT_EXPIRY_THRESHOLD));
    assert_eq!(v.time_until_expiry(Some(token.as_str())), Duration::ZERO);
}

#[test]
fn validity_follows_the_clock() {
    let (v, clock) = validator();
    let token = mint_token("u", NOW + 10);
    assert!(v.is_valid(Some(token.as_str())));
    clock.advance(10);
    assert!(!v.is_valid(Some(token.as_str())));
}

#[yare::parameterized(
    just_outside = { 301, false },
    at_threshold = { 300, false },
    just_inside = { 299, true },
    nearly_expired = { 1, true },
    expired = { -1, false },
    far_future = { 86_400, false },
)]
fn expiring_soon_boundary(delta: i64, expected: bool) {
    let (v, _) = validator();
    let token = mint_token("u", NOW + delta);
    assert_eq!(v.is_expiring_soon(Some(token.as_str()), DEFAULT_EXPIRY_THRESHOLD), expected);
}

#[test]
fn custom_threshold() {
    let (v, _) = validator();
    let token = mint_token("u", NOW + 45);
    assert!(v.is_expiring_soon(Some(token.as_str()), Duration::from_secs(60)));
    assert!(!v.is_expiring_soon(Some(token.as_str()), Duration::from_secs(30)));
}

proptest! {
    #[test]
    fn time_until_expiry_matches_delta(delta in -100_000i64..100_000) {
        let (v, _) = validator();
        let token = mint_token("u", NOW + delta);
        let expected = Duration::from_secs(delta.max(0) as u64);
        prop_assert_eq!(v.time_until_expiry(Some(token.as_str())), expected);
    }
}
