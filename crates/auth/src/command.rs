// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `abattoir-auth` operator commands.
//!
//! Each command returns a process exit code: 0 on success, 1 when the
//! operation failed, 2 for usage errors.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::claims::SegmentedClaimsDecoder;
use crate::clock::SystemClock;
use crate::config::AuthConfig;
use crate::manager::{SessionAuth, TokenManager};
use crate::store::FileStore;

#[derive(Debug, Parser)]
#[command(name = "abattoir-auth", version, about = "Manage the dashboard's stored session.")]
pub struct Cli {
    #[command(flatten)]
    pub auth: AuthConfig,

    /// Log format (json or text).
    #[arg(long, env = "ABATTOIR_AUTH_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "ABATTOIR_AUTH_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store a new session.
    Login(LoginArgs),
    /// End the stored session.
    Logout,
    /// Print the session state as JSON.
    Status,
    /// Trade the refresh token for a new access token now.
    Refresh,
    /// Keep the session fresh until interrupted.
    Watch,
    /// GET an API path with the session's credential and print the body.
    Get(GetArgs),
}

#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long, env = "ABATTOIR_AUTH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct GetArgs {
    /// Path relative to the API base URL (e.g. `/lots/42`).
    pub path: String,
    /// API base URL.
    #[arg(long, env = "ABATTOIR_API_URL")]
    pub api_url: Option<String>,
}

/// Build the manager over the configured credential file.
pub fn open_manager(config: &AuthConfig) -> anyhow::Result<TokenManager> {
    let store = FileStore::open(config.credential_path())?;
    TokenManager::new(
        Arc::new(store),
        Arc::new(SegmentedClaimsDecoder::default()),
        Arc::new(SystemClock),
        config.clone(),
    )
}

pub async fn run(cli: Cli) -> i32 {
    let manager = match open_manager(&cli.auth) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {e:#}");
            return 2;
        }
    };

    match cli.command {
        Command::Login(args) => cmd_login(&manager, args).await,
        Command::Logout => {
            manager.logout().await;
            0
        }
        Command::Status => cmd_status(&manager).await,
        Command::Refresh => cmd_refresh(&manager).await,
        Command::Watch => cmd_watch(&manager, shutdown_on_ctrl_c()).await,
        Command::Get(args) => cmd_get(&manager, args).await,
    }
}

async fn cmd_login(manager: &TokenManager, args: LoginArgs) -> i32 {
    let Some(password) = args.password else {
        eprintln!("error: no password given (use --password or ABATTOIR_AUTH_PASSWORD)");
        return 2;
    };
    match manager.login(&args.username, &password).await {
        Ok(session) => {
            let name = session.profile.map(|p| p.name).unwrap_or(args.username);
            println!("logged in as {name}");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

async fn cmd_status(manager: &TokenManager) -> i32 {
    // Gives a legacy session the chance to migrate and clears a dead one.
    manager.is_authenticated().await;
    match serde_json::to_string_pretty(&manager.status()) {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

async fn cmd_refresh(manager: &TokenManager) -> i32 {
    if !manager.is_authenticated().await {
        eprintln!("error: not logged in");
        return 1;
    }
    match manager.refresh().await {
        Ok(_) => {
            println!("refreshed, expires in {}s", manager.time_until_expiry().as_secs());
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

pub async fn cmd_watch(manager: &TokenManager, shutdown: CancellationToken) -> i32 {
    if !manager.is_authenticated().await {
        eprintln!("error: not logged in");
        return 1;
    }

    let mut events = manager.subscribe();
    let scheduler = Arc::new(manager.scheduler());
    let handle = Arc::clone(&scheduler).spawn(shutdown.clone());
    info!("watching session");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if let Ok(line) = serde_json::to_string(&event) {
                        println!("{line}");
                    }
                    if matches!(event, crate::event::SessionEvent::LoggedOut { .. }) {
                        shutdown.cancel();
                        let _ = handle.await;
                        return 1;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    let _ = handle.await;
    0
}

async fn cmd_get(manager: &TokenManager, args: GetArgs) -> i32 {
    let Some(api_url) = args.api_url else {
        eprintln!("error: no API URL given (use --api-url or ABATTOIR_API_URL)");
        return 2;
    };
    let url = format!("{}/{}", api_url.trim_end_matches('/'), args.path.trim_start_matches('/'));

    manager.is_authenticated().await;
    let gateway = manager.gateway();
    let resp = match gateway.send(gateway.request(reqwest::Method::GET, &url)).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if status.is_success() {
        println!("{body}");
        0
    } else {
        eprintln!("error: {status}: {body}");
        1
    }
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let sd = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        sd.cancel();
    });
    shutdown
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
