// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod claims;
pub mod client;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod manager;
pub mod migrate;
pub mod scheduler;
pub mod single_flight;
pub mod store;
pub mod test_support;
pub mod validator;
pub mod vault;

pub use error::AuthError;
pub use manager::{SessionAuth, SessionState, SessionStatus, TokenManager};
