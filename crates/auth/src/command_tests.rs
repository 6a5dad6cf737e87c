// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn parse(args: &[&str]) -> Cli {
    let argv: Vec<&str> = std::iter::once("abattoir-auth").chain(args.iter().copied()).collect();
    Cli::try_parse_from(argv).unwrap_or_else(|e| panic!("parse failed: {e}"))
}

fn with_store(dir: &tempfile::TempDir, args: &[&str]) -> Cli {
    let path = dir.path().join("credentials.json");
    let path = path.to_string_lossy().into_owned();
    let mut argv = vec![
        "--credential-path",
        path.as_str(),
        "--identity-url",
        "http://127.0.0.1:9",
    ];
    argv.extend_from_slice(args);
    parse(&argv)
}

#[test]
fn help_flag_handled_by_clap() {
    let err = Cli::try_parse_from(["abattoir-auth", "--help"]).unwrap_err();
    assert!(!err.use_stderr());
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["abattoir-auth"]).is_err());
}

#[test]
fn global_config_flags_parse() {
    let cli = parse(&["--identity-url", "https://id.example/auth", "--expiry-threshold-secs", "60", "status"]);
    assert_eq!(cli.auth.identity_url, "https://id.example/auth");
    assert_eq!(cli.auth.expiry_threshold().as_secs(), 60);
    assert!(matches!(cli.command, Command::Status));
}

#[test]
fn get_takes_path_and_api_url() {
    let cli = parse(&["get", "/lots/42", "--api-url", "http://api.local"]);
    match cli.command {
        Command::Get(args) => {
            assert_eq!(args.path, "/lots/42");
            assert_eq!(args.api_url.as_deref(), Some("http://api.local"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[tokio::test]
async fn login_without_password_returns_2() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cli = with_store(&dir, &["login", "--username", "ada"]);
    if let Command::Login(ref mut args) = cli.command {
        args.password = None;
    }
    assert_eq!(run(cli).await, 2);
    Ok(())
}

#[tokio::test]
async fn get_without_api_url_returns_2() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cli = with_store(&dir, &["get", "/lots"]);
    if let Command::Get(ref mut args) = cli.command {
        args.api_url = None;
    }
    assert_eq!(run(cli).await, 2);
    Ok(())
}

#[tokio::test]
async fn login_against_unreachable_endpoint_returns_1() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cli = with_store(&dir, &["login", "--username", "ada", "--password", "pw"]);
    assert_eq!(run(cli).await, 1);
    Ok(())
}

#[tokio::test]
async fn status_of_empty_store_succeeds() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    assert_eq!(run(with_store(&dir, &["status"])).await, 0);
    Ok(())
}

#[tokio::test]
async fn refresh_without_session_returns_1() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    assert_eq!(run(with_store(&dir, &["refresh"])).await, 1);
    Ok(())
}

#[tokio::test]
async fn watch_without_session_returns_1() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cli = with_store(&dir, &["watch"]);
    let manager = open_manager(&cli.auth)?;
    assert_eq!(cmd_watch(&manager, CancellationToken::new()).await, 1);
    Ok(())
}
