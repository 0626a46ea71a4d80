#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;
use std::time::Duration;

use anyhow::Error;
use anyhow::Result;
use owo_colors::OwoColorize;
use tokio::sync::mpsc;
use tokio::task;

use crate::application::cli;
use crate::application::ui;
use crate::configuration::log_dir;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Event;
use crate::domain::services::SessionController;
use crate::domain::services::SessionsPoller;
use crate::infrastructure::backends::BackendManager;
use crate::infrastructure::stores::StoreManager;

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        format!(
            "Oh no! ragchat has failed with the following app version and error.\n\nVersion: {}\nCommit: {}\nError: {:#}",
            env!("CARGO_PKG_VERSION"),
            env!("VERGEN_GIT_DESCRIBE"),
            err
        )
        .red()
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 RUST_LOG=ragchat {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

async fn start_chat() -> Result<()> {
    let backend = BackendManager::get();
    if let Err(err) = backend.health_check().await {
        tracing::warn!(error = ?err, "Backend health check failed");
        eprintln!(
            "{}",
            format!(
                "Warning: the backend at {} is not responding ({err}). Answers will fail until it is reachable.",
                Config::get(ConfigKey::BackendURL)
            )
            .yellow()
        );
    }

    let refresh_interval = Config::get_millis(ConfigKey::SessionsRefreshInterval)?;
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
    let controller = SessionController::new(
        backend,
        StoreManager::get(&Config::get(ConfigKey::StoreFile)),
        event_tx,
    );

    let mut background_futures = task::JoinSet::new();
    background_futures.spawn(SessionsPoller::start(
        controller.clone(),
        Duration::from_millis(refresh_interval),
    ));

    let ui_future = ui::start(controller, event_rx);

    let res = tokio::select!(
        res = background_futures.join_next() => match res {
            Some(Ok(res)) => res,
            Some(Err(err)) => Err(err.into()),
            None => Ok(()),
        },
        res = ui_future => res,
    );

    return res;
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let file_appender = tracing_appender::rolling::never(log_dir(), "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("ragchat")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    match cli::parse().await {
        Ok(true) => {}
        Ok(false) => process::exit(0),
        Err(err) => {
            handle_error(err);
            return;
        }
    }

    if let Err(err) = start_chat().await {
        handle_error(err);
    }

    process::exit(0);
}
