use std::path;

use anyhow::Result;
use owo_colors::OwoColorize;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;

use crate::application::cli::format_session;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::help_text;
use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::Role;
use crate::domain::models::SlashCommand;
use crate::domain::services::SendOutcome;
use crate::domain::services::SessionController;

/// Writes controller events and command output to stdout. Stream updates are
/// written as deltas of the trailing message.
struct Printer {
    stdout: tokio::io::Stdout,
    active_session_id: Option<String>,
    streamed: Option<String>,
}

impl Printer {
    fn new() -> Printer {
        return Printer {
            stdout: tokio::io::stdout(),
            active_session_id: None,
            streamed: None,
        };
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        self.stdout.write_all(text.as_bytes()).await?;
        self.stdout.flush().await?;
        return Ok(());
    }

    /// Prints a full line, breaking out of a reply that is still streaming.
    async fn line(&mut self, text: &str) -> Result<()> {
        let interrupted = self
            .streamed
            .as_ref()
            .map(|streamed| return !streamed.is_empty())
            .unwrap_or(false);
        if interrupted {
            self.write("\n").await?;
        }
        return self.write(&format!("{text}\n")).await;
    }

    fn format_sources(message: &Message) -> Option<String> {
        let sources = message.sources.as_ref()?;
        if sources.is_empty() {
            return None;
        }

        return Some(
            format!("Sources: {}", sources.join(", "))
                .dimmed()
                .to_string(),
        );
    }

    fn format_message(message: &Message) -> String {
        let mut res = match message.role {
            Role::User => format!("{} {}", "you>".green().bold(), message.content),
            Role::Assistant => format!("{} {}", "assistant>".cyan().bold(), message.content),
        };
        if let Some(sources) = Printer::format_sources(message) {
            res = format!("{res}\n{sources}");
        }

        return res;
    }

    async fn on_update(&mut self, message: Message) -> Result<()> {
        let streamed = self.streamed.take().unwrap_or_default();
        match message.content.strip_prefix(streamed.as_str()) {
            Some(delta) => self.write(delta).await?,
            // Failures replace the partial answer rather than extend it.
            None => self.write(&format!("\n{}", message.content)).await?,
        }

        if message.streaming {
            self.streamed = Some(message.content);
            return Ok(());
        }

        self.write("\n").await?;
        if let Some(sources) = Printer::format_sources(&message) {
            self.write(&format!("{sources}\n")).await?;
        }

        return Ok(());
    }

    async fn on_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::LogReplaced(session_id, messages) => {
                self.streamed = None;
                if session_id != self.active_session_id {
                    let header = match &session_id {
                        Some(session_id) => format!("Session {session_id}"),
                        None => "No active session. Type a message or /new to start one."
                            .to_string(),
                    };
                    self.line(&header.yellow().to_string()).await?;
                    self.active_session_id = session_id;
                }
                for message in messages.into_iter() {
                    if message.streaming {
                        self.write(&format!("{} {}", "assistant>".cyan().bold(), message.content))
                            .await?;
                        self.streamed = Some(message.content);
                        continue;
                    }
                    self.line(&Printer::format_message(&message)).await?;
                }
            }
            Event::MessageAppended(message) => {
                if message.role == Role::Assistant {
                    self.write(&format!("{} ", "assistant>".cyan().bold()))
                        .await?;
                    self.streamed = Some(message.content);
                }
            }
            Event::MessageUpdated(message) => {
                self.on_update(message).await?;
            }
            Event::SessionsListed(sessions) => {
                tracing::debug!(count = sessions.len(), "Session list refreshed");
            }
        }

        return Ok(());
    }
}

async fn print_events(
    mut event_rx: mpsc::UnboundedReceiver<Event>,
    mut notice_rx: mpsc::UnboundedReceiver<String>,
) -> Result<()> {
    let mut printer = Printer::new();

    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(event) => printer.on_event(event).await?,
                None => return Ok(()),
            },
            notice = notice_rx.recv() => match notice {
                Some(notice) => printer.line(&notice).await?,
                None => return Ok(()),
            },
        }
    }
}

fn notify(notice_tx: &mpsc::UnboundedSender<String>, text: String) {
    if notice_tx.send(text).is_err() {
        tracing::debug!("Printer has stopped, dropping notice");
    }
}

async fn list_sessions(controller: &SessionController) -> String {
    controller.refresh_sessions().await;
    let active_session_id = controller.active_session_id().await;
    let sessions = controller.sessions().await;
    if sessions.is_empty() {
        return "There are no sessions available.".to_string();
    }

    let mut lines = vec![];
    for session in sessions.iter() {
        let mut line = format_session(session);
        if active_session_id.as_deref() == Some(session.session_id.as_str()) {
            line = format!("{line} {}", "(active)".bold());
        }
        if controller.is_sending(&session.session_id).await {
            line = format!("{line} {}", "(answering)".dimmed());
        }
        lines.push(line);
    }

    return lines.join("\n");
}

/// Runs one slash command. Returns false once the user asked to quit.
async fn run_command(
    command: SlashCommand,
    controller: &SessionController,
    notice_tx: &mpsc::UnboundedSender<String>,
) -> bool {
    if command.is_quit() {
        return false;
    }

    if command.is_help() {
        notify(notice_tx, help_text());
    } else if command.is_new_session() {
        controller.create_session().await;
    } else if command.is_list_sessions() {
        notify(notice_tx, list_sessions(controller).await);
    } else if command.is_open_session() {
        match command.argument() {
            Some(session_id) => controller.select_session(&session_id).await,
            None => notify(notice_tx, "Usage: /open SESSION_ID".to_string()),
        }
    } else if command.is_delete_session() {
        match command.argument() {
            Some(session_id) => match controller.delete_session(&session_id).await {
                Ok(()) => notify(notice_tx, format!("Deleted session {session_id}")),
                Err(err) => notify(
                    notice_tx,
                    format!("Failed to delete session: {err}").red().to_string(),
                ),
            },
            None => notify(notice_tx, "Usage: /delete SESSION_ID".to_string()),
        }
    } else if command.is_upload() {
        match command.argument() {
            Some(file) => {
                let controller = controller.clone();
                let notice_tx = notice_tx.clone();
                tokio::spawn(async move {
                    let status = controller.upload(path::Path::new(&file)).await;
                    notify(&notice_tx, status);
                });
            }
            None => notify(notice_tx, "Usage: /upload PATH".to_string()),
        }
    }

    return true;
}

fn send(text: String, controller: &SessionController, notice_tx: &mpsc::UnboundedSender<String>) {
    let controller = controller.clone();
    let notice_tx = notice_tx.clone();
    tokio::spawn(async move {
        if controller.send_message(&text).await == SendOutcome::Busy {
            notify(
                &notice_tx,
                "Still answering the previous message, try again in a moment."
                    .yellow()
                    .to_string(),
            );
        }
    });
}

/// Picks the session to start with: an explicit id, then the cached one, then
/// a fresh session.
async fn open_initial_session(controller: &SessionController) {
    let session_id = Config::get(ConfigKey::SessionID);
    if !session_id.is_empty() {
        controller.select_session(&session_id).await;
        return;
    }

    if controller.restore().await.is_none() {
        controller.create_session().await;
    }
}

pub async fn start(
    controller: SessionController,
    event_rx: mpsc::UnboundedReceiver<Event>,
) -> Result<()> {
    let (notice_tx, notice_rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(print_events(event_rx, notice_rx));

    notify(
        &notice_tx,
        "Type a message to chat, or /help for commands."
            .dimmed()
            .to_string(),
    );
    open_initial_session(&controller).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(command) = SlashCommand::parse(&line) {
            if !run_command(command, &controller, &notice_tx).await {
                break;
            }
            continue;
        }

        send(line, &controller, &notice_tx);
    }

    printer.abort();
    return Ok(());
}
