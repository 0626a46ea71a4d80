use anyhow::Result;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;

use super::Config;
use super::ConfigKey;
use crate::application::cli;

// Config is process wide, tests that load it take turns.
static LOAD_LOCK: Lazy<Mutex<()>> = Lazy::new(|| return Mutex::new(()));

#[test]
fn it_serializes_to_valid_toml() -> Result<()> {
    let res = Config::serialize_default(cli::build());
    let doc = res.parse::<toml_edit::Document>()?;

    assert_eq!(
        doc.get("backend-url").and_then(|val| return val.as_str()),
        Some("http://localhost:8000/api")
    );
    assert_eq!(
        doc.get("sessions-refresh-interval")
            .and_then(|val| return val.as_integer()),
        Some(10000)
    );
    assert!(res.contains("# api-key = \"\""));
    assert!(doc.get("session-id").is_none());
    assert!(doc.get("config-file").is_none());

    return Ok(());
}

#[tokio::test]
async fn it_loads_config_from_file() -> Result<()> {
    let _lock = LOAD_LOCK.lock().await;
    let matches = cli::build().try_get_matches_from(vec![
        "ragchat",
        "chat",
        "-c",
        "./config.example.toml",
        "--sessions-refresh-interval",
        "2500",
    ])?;
    let chat_matches = matches
        .subcommand_matches("chat")
        .ok_or_else(|| return anyhow::anyhow!("missing chat matches"))?;

    Config::load(vec![&matches, chat_matches]).await?;

    assert_eq!(
        Config::get(ConfigKey::BackendURL),
        "http://localhost:9000/api"
    );
    assert_eq!(Config::get_millis(ConfigKey::BackendHealthCheckTimeout)?, 2000);
    assert_eq!(Config::get_millis(ConfigKey::SessionsRefreshInterval)?, 2500);
    assert_eq!(Config::get(ConfigKey::ApiKey), "");

    return Ok(());
}

#[tokio::test]
async fn it_fails_to_load_config_from_file() -> Result<()> {
    let _lock = LOAD_LOCK.lock().await;
    let matches = cli::build().try_get_matches_from(vec![
        "ragchat",
        "-c",
        "./test/fixtures/bad-config.toml",
    ])?;

    let res = Config::load(vec![&matches]).await;

    assert!(res.is_err());
    return Ok(());
}

#[tokio::test]
async fn it_rejects_invalid_intervals_from_flags() -> Result<()> {
    let _lock = LOAD_LOCK.lock().await;
    let matches = cli::build().try_get_matches_from(vec![
        "ragchat",
        "-c",
        "./does-not-exist.toml",
        "--sessions-refresh-interval",
        "0",
    ])?;

    let res = Config::load(vec![&matches]).await;

    assert!(res.is_err());
    return Ok(());
}
