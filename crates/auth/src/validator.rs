// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Expiry arithmetic over decoded claims.

use std::sync::Arc;
use std::time::Duration;

use crate::claims::{Claims, ClaimsDecoder};
use crate::clock::Clock;
use crate::error::AuthError;

/// Default expiring-soon window (5 minutes).
pub const DEFAULT_EXPIRY_THRESHOLD: Duration = Duration::from_secs(300);

/// Answers "is this token usable" and "how long until it is not".
///
/// Absent and undecodable tokens are simply invalid; nothing here returns
/// an error.
#[derive(Clone)]
pub struct TokenValidator {
    decoder: Arc<dyn ClaimsDecoder>,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(decoder: Arc<dyn ClaimsDecoder>, clock: Arc<dyn Clock>) -> Self {
        Self { decoder, clock }
    }

    pub fn now_secs(&self) -> i64 {
        self.clock.now_secs()
    }

    /// Decode without judging expiry.
    pub fn claims(&self, token: &str) -> Result<Claims, AuthError> {
        self.decoder.decode(token)
    }

    /// Claims of a token that is present, decodes and has not expired.
    pub fn valid_claims(&self, token: Option<&str>) -> Option<Claims> {
        let claims = self.decoder.decode(token?).ok()?;
        (claims.exp > self.clock.now_secs()).then_some(claims)
    }

    pub fn is_valid(&self, token: Option<&str>) -> bool {
        self.valid_claims(token).is_some()
    }

    /// Valid, but with less than `threshold` left.
    pub fn is_expiring_soon(&self, token: Option<&str>, threshold: Duration) -> bool {
        match self.valid_claims(token) {
            Some(claims) => {
                let remaining = claims.exp - self.clock.now_secs();
                (remaining as u64) < threshold.as_secs()
            }
            None => false,
        }
    }

    /// Time left before expiry; zero for absent, malformed or expired tokens.
    pub fn time_until_expiry(&self, token: Option<&str>) -> Duration {
        let Some(claims) = token.and_then(|t| self.decoder.decode(t).ok()) else {
            return Duration::ZERO;
        };
        let remaining = claims.exp.saturating_sub(self.clock.now_secs());
        Duration::from_secs(remaining.max(0) as u64)
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
