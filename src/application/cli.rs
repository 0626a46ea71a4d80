#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::Arg;
use clap::ArgAction;
use clap::ArgGroup;
use clap::ArgMatches;
use clap::Command;
use owo_colors::OwoColorize;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::help_text;
use crate::domain::models::Event;
use crate::domain::models::Session;
use crate::domain::services::SessionController;
use crate::domain::services::DEFAULT_TEXT_FILENAME;
use crate::infrastructure::backends::BackendManager;
use crate::infrastructure::stores::StoreManager;

pub fn format_session(session: &Session) -> String {
    return format!(
        "- (ID: {}) {}, Messages: {}",
        session.session_id,
        session.display_title(),
        session.message_count
    );
}

/// Controller for one-shot commands. Nothing listens to its events. An empty
/// `store_file` keeps it off the session cache.
fn headless_controller(store_file: &str) -> SessionController {
    let (tx, _) = mpsc::unbounded_channel::<Event>();
    return SessionController::new(BackendManager::get(), StoreManager::get(store_file), tx);
}

async fn print_sessions_list() -> Result<()> {
    let sessions = BackendManager::get()
        .list_sessions()
        .await?
        .iter()
        .map(format_session)
        .collect::<Vec<String>>();

    if sessions.is_empty() {
        println!("There are no sessions available. You should start your first one!");
    } else {
        println!("{}", sessions.join("\n"));
    }

    return Ok(());
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_chat() -> Command {
    return Command::new("chat")
        .about("Start chatting. Resumes the last active session unless told otherwise.")
        .arg(
            Arg::new(ConfigKey::SessionID.to_string())
                .short('i')
                .long("id")
                .env("RAGCHAT_SESSION_ID")
                .num_args(1)
                .help("Open the session with this ID instead of resuming the last one."),
        )
        .arg(
            Arg::new("ephemeral")
                .long("ephemeral")
                .help("Do not read or write the local session cache.")
                .action(ArgAction::SetTrue),
        );
}

fn subcommand_sessions() -> Command {
    return Command::new("sessions")
        .about("Manage chat sessions stored by the backend.")
        .arg_required_else_help(true)
        .subcommand(Command::new("list").about("List all sessions with their ids, titles, and message counts."))
        .subcommand(
            Command::new("delete")
                .about("Delete a session by ID.")
                .arg(
                    Arg::new(ConfigKey::SessionID.to_string())
                        .short('i')
                        .long("id")
                        .help("Session ID")
                        .num_args(1)
                        .required(true),
                ),
        );
}

fn subcommand_upload() -> Command {
    return Command::new("upload")
        .about("Upload a document to the backend's knowledge base.")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .help("Path to a .txt or .md document")
                .num_args(1),
        )
        .arg(
            Arg::new("text")
                .short('t')
                .long("text")
                .help("Text to ingest as a document")
                .num_args(1),
        )
        .arg(
            Arg::new("stdin")
                .long("stdin")
                .help("Read the document text from stdin.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("name")
                .short('n')
                .long("name")
                .help("Document name for --text and --stdin uploads")
                .num_args(1)
                .default_value(DEFAULT_TEXT_FILENAME),
        )
        .group(
            ArgGroup::new("source")
                .args(["file", "text", "stdin"])
                .required(true),
        );
}

async fn upload(upload_matches: &ArgMatches) -> Result<String> {
    let controller = headless_controller("");
    if let Some(file) = upload_matches.get_one::<String>("file") {
        return Ok(controller.upload(path::Path::new(file)).await);
    }

    let name = upload_matches
        .get_one::<String>("name")
        .map(|name| return name.to_string())
        .unwrap_or_default();
    let text = match upload_matches.get_one::<String>("text") {
        Some(text) => text.to_string(),
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        }
    };

    return Ok(controller.upload_text(&text, &name).await);
}

fn arg_millis(key: ConfigKey, env: &'static str, help: &str) -> Arg {
    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env)
        .num_args(1)
        .help(format!("{help} [default: {}]", Config::default(key)))
        .global(true);
}

pub fn build() -> Command {
    let commands_text = help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            if line.starts_with("COMMANDS:") {
                return format!("CHAT {line}").bold().underline().to_string();
            }
            return line.to_string();
        })
        .collect::<Vec<String>>()
        .join("\n");

    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    return Command::new("ragchat")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(subcommand_chat())
        .subcommand(subcommand_config())
        .subcommand(subcommand_sessions())
        .subcommand(subcommand_upload())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("RAGCHAT_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::BackendURL.to_string())
                .short('u')
                .long(ConfigKey::BackendURL.to_string())
                .env("RAGCHAT_BACKEND_URL")
                .num_args(1)
                .help(format!("Base URL of the RAG backend API. [default: {}]", Config::default(ConfigKey::BackendURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::ApiKey.to_string())
                .long(ConfigKey::ApiKey.to_string())
                .env("RAGCHAT_API_KEY")
                .num_args(1)
                .help("Bearer token sent with every backend request.")
                .global(true),
        )
        .arg(arg_millis(
            ConfigKey::BackendHealthCheckTimeout,
            "RAGCHAT_BACKEND_HEALTH_CHECK_TIMEOUT",
            "Time to wait in milliseconds before timing out when doing a healthcheck for the backend.",
        ))
        .arg(arg_millis(
            ConfigKey::SessionsRefreshInterval,
            "RAGCHAT_SESSIONS_REFRESH_INTERVAL",
            "Time in milliseconds between refreshes of the session list while chatting.",
        ))
        .arg(
            Arg::new(ConfigKey::StoreFile.to_string())
                .long(ConfigKey::StoreFile.to_string())
                .env("RAGCHAT_STORE_FILE")
                .num_args(1)
                .help(format!("Where the active session is cached between runs. [default: {}]", Config::default(ConfigKey::StoreFile)))
                .global(true),
        );
}

fn load_chat_options(chat_matches: &ArgMatches) {
    if chat_matches.get_flag("ephemeral") {
        Config::set(ConfigKey::StoreFile, "");
    }
}

/// Handles every subcommand that does not need the chat loop. Returns true
/// when the chat loop should start.
pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(false);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(false);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(false);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(false);
            }
        },
        Some(("sessions", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("list", list_matches)) => {
                Config::load(vec![&matches, list_matches]).await?;
                print_sessions_list().await?;
                return Ok(false);
            }
            Some(("delete", delete_matches)) => {
                Config::load(vec![&matches, delete_matches]).await?;
                let session_id = Config::get(ConfigKey::SessionID);
                headless_controller(&Config::get(ConfigKey::StoreFile))
                    .delete_session(&session_id)
                    .await?;
                println!("Deleted session {session_id}");
                return Ok(false);
            }
            _ => {
                subcommand_sessions().print_long_help()?;
                return Ok(false);
            }
        },
        Some(("upload", upload_matches)) => {
            Config::load(vec![&matches, upload_matches]).await?;
            println!("{}", upload(upload_matches).await?);
            return Ok(false);
        }
        Some(("chat", chat_matches)) => {
            Config::load(vec![&matches, chat_matches]).await?;
            load_chat_options(chat_matches);
        }
        _ => {
            Config::load(vec![&matches]).await?;
        }
    }

    return Ok(true);
}
