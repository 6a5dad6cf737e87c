// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reading the self-describing payload of a token.
//!
//! Claims are never trusted for authorization and signatures are not
//! checked here; the only thing the client needs is the expiry and the
//! subject.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AuthError;

/// Claims carried by an access or refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    /// Subject identifier. Numeric subjects are kept as their decimal string.
    #[serde(deserialize_with = "string_or_number")]
    pub sub: String,
    /// Every other claim, untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn string_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unsupported subject: {other}"))),
    }
}

/// Turns a token string into [`Claims`] without touching the network.
pub trait ClaimsDecoder: Send + Sync {
    fn decode(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Decoder for `header.payload.signature` tokens (JWT layout).
#[derive(Debug, Clone, Copy)]
pub struct SegmentedClaimsDecoder {
    delimiter: char,
}

impl SegmentedClaimsDecoder {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }
}

impl Default for SegmentedClaimsDecoder {
    fn default() -> Self {
        Self::new('.')
    }
}

impl ClaimsDecoder for SegmentedClaimsDecoder {
    fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let segments: Vec<&str> = token.split(self.delimiter).collect();
        let [header, payload, signature] = segments.as_slice() else {
            return Err(AuthError::Malformed);
        };
        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(AuthError::Malformed);
        }

        let bytes =
            URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).map_err(|_| AuthError::Malformed)?;
        serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)
    }
}

#[cfg(test)]
#[path = "claims_tests.rs"]
mod tests;
