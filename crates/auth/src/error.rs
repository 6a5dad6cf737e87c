// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Failures surfaced by the credential lifecycle.
///
/// `Clone` so a single refresh outcome can be handed to every caller that
/// joined the same in-flight refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The identity endpoint rejected the username/password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A token could not be decoded. Treated exactly like an expired token.
    #[error("malformed token")]
    Malformed,

    /// The refresh token is missing, expired, rejected, or the session it
    /// belonged to was torn down while the refresh was in flight.
    #[error("refresh token invalid")]
    RefreshTokenInvalid,

    /// Transport failure or timeout talking to the identity endpoint.
    #[error("network error: {0}")]
    NetworkError(String),

    /// An API call was rejected with 401/403 after the retry-once protocol.
    #[error("authorization failure (HTTP {status})")]
    AuthorizationFailure { status: u16 },

    /// The credential store failed to read or write.
    #[error("credential store error: {0}")]
    Store(String),
}

impl AuthError {
    /// Stable machine-readable code, e.g. for the CLI's JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Malformed => "MALFORMED",
            Self::RefreshTokenInvalid => "REFRESH_TOKEN_INVALID",
            Self::NetworkError(_) => "NETWORK_ERROR",
            Self::AuthorizationFailure { .. } => "AUTHORIZATION_FAILURE",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// True when the only way forward is a fresh login ("log in again"),
    /// false when the user may simply retry ("try again").
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::Malformed | Self::RefreshTokenInvalid | Self::AuthorizationFailure { .. }
        )
    }

    pub(crate) fn network(err: impl std::fmt::Display) -> Self {
        Self::NetworkError(err.to_string())
    }

    pub(crate) fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(format!("{err:#}"))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::NetworkError(format!("timed out: {err}"))
        } else {
            Self::network(err)
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
