// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    UserRequested,
    /// Both tokens expired or could not be decoded.
    Expired,
    /// A refresh failed and the session could not be kept.
    RefreshFailed,
}

/// Lifecycle transitions, broadcast so the UI can show banners or redirect
/// to the login screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn { subject: String },
    /// A legacy single-token session was upgraded without a login.
    Migrated { subject: String },
    Refreshed,
    RefreshFailed { error: String },
    LoggedOut { reason: LogoutReason },
}
