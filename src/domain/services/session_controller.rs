#[cfg(test)]
#[path = "session_controller_test.rs"]
mod tests;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use super::StreamObserver;
use super::StreamReducer;
use crate::domain::models::BackendBox;
use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::Session;
use crate::domain::models::StoreBox;

const UPLOAD_EXTENSIONS: [&str; 2] = ["txt", "md"];
pub const DEFAULT_TEXT_FILENAME: &str = "document.txt";

/// Identifies the selection a streaming request was started under. The epoch
/// changes on every create, select, or clear, so a stamp never matches again
/// once its session has been switched away from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stamp {
    pub session_id: String,
    pub epoch: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, nothing was sent.
    Ignored,
    /// A send is already in flight for the active session.
    Busy,
    Completed,
    Failed,
}

#[derive(Default)]
struct ControllerState {
    active_session_id: Option<String>,
    messages: Vec<Message>,
    epoch: u64,
    /// Messages appended locally since the last activation. History fetched
    /// for this activation predates them, so they stay at the tail.
    local_appends: usize,
    /// Sessions with a send outstanding.
    in_flight: HashSet<String>,
    sessions: Vec<Session>,
}

impl ControllerState {
    fn activate(&mut self, session_id: Option<String>, messages: Vec<Message>) -> u64 {
        self.epoch += 1;
        self.local_appends = 0;
        self.active_session_id = session_id;
        self.messages = messages;

        return self.epoch;
    }

    /// Replaces everything but the locally appended tail with `history`.
    fn reconcile(&mut self, history: Vec<Message>) {
        let tail_start = self.messages.len().saturating_sub(self.local_appends);
        let tail = self.messages.split_off(tail_start);
        self.messages = history;
        self.messages.extend(tail);
    }

    fn is_current(&self, stamp: &Stamp) -> bool {
        return self.epoch == stamp.epoch
            && self.active_session_id.as_deref() == Some(stamp.session_id.as_str());
    }
}

struct StampedApplier {
    controller: SessionController,
    stamp: Stamp,
}

#[async_trait]
impl StreamObserver for StampedApplier {
    async fn on_update(&mut self, message: Message) -> Result<()> {
        self.controller.apply_update(&self.stamp, message).await;
        return Ok(());
    }
}

fn validate_upload(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .map(|ext| return ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if !UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
        bail!(
            "only .txt and .md files are supported, got '{}'",
            path.display()
        );
    }

    return Ok(());
}

/// Owns the conversation log of the active session. Cloning is cheap and every
/// clone shares the same state.
#[derive(Clone)]
pub struct SessionController {
    backend: Arc<BackendBox>,
    store: Arc<StoreBox>,
    state: Arc<Mutex<ControllerState>>,
    tx: mpsc::UnboundedSender<Event>,
}

impl SessionController {
    pub fn new(
        backend: BackendBox,
        store: StoreBox,
        tx: mpsc::UnboundedSender<Event>,
    ) -> SessionController {
        return SessionController {
            backend: Arc::new(backend),
            store: Arc::new(store),
            state: Arc::new(Mutex::new(ControllerState::default())),
            tx,
        };
    }

    pub async fn active_session_id(&self) -> Option<String> {
        return self.state.lock().await.active_session_id.clone();
    }

    pub async fn messages(&self) -> Vec<Message> {
        return self.state.lock().await.messages.clone();
    }

    pub async fn sessions(&self) -> Vec<Session> {
        return self.state.lock().await.sessions.clone();
    }

    pub async fn is_sending(&self, session_id: &str) -> bool {
        return self.state.lock().await.in_flight.contains(session_id);
    }

    fn notify(&self, event: Event) {
        if let Err(err) = self.tx.send(event) {
            tracing::debug!(error = ?err, "No listener for controller event");
        }
    }

    /// Writes the active slot through to the store. Callers hold the state
    /// lock, so writes land in the same order the state changed.
    async fn mirror(&self, state: &ControllerState) {
        let res = match &state.active_session_id {
            Some(session_id) => self.store.save_active(session_id, &state.messages).await,
            None => self.store.clear_active().await,
        };

        if let Err(err) = res {
            tracing::warn!(error = ?err, "Failed to mirror active session to the store");
        }
    }

    async fn activate(&self, session_id: &str, messages: Vec<Message>) -> Stamp {
        let mut state = self.state.lock().await;
        let epoch = state.activate(Some(session_id.to_string()), messages.clone());
        self.mirror(&state).await;
        self.notify(Event::LogReplaced(Some(session_id.to_string()), messages));

        return Stamp {
            session_id: session_id.to_string(),
            epoch,
        };
    }

    /// Replaces the log with the backend's history if the selection is still
    /// current. Messages sent since the selection are kept after the history.
    async fn load_history(&self, stamp: &Stamp) -> bool {
        let history = match self.backend.history(&stamp.session_id).await {
            Ok(history) => history,
            Err(err) => {
                tracing::warn!(error = ?err, session_id = stamp.session_id, "Failed to fetch session history");
                return false;
            }
        };

        let mut state = self.state.lock().await;
        if !state.is_current(stamp) {
            tracing::debug!(
                session_id = stamp.session_id,
                "Discarding history for a superseded selection"
            );
            return false;
        }

        state.reconcile(history.into_iter().map(Message::settled).collect());
        self.mirror(&state).await;
        self.notify(Event::LogReplaced(
            Some(stamp.session_id.to_string()),
            state.messages.clone(),
        ));

        return true;
    }

    async fn apply_update(&self, stamp: &Stamp, message: Message) {
        let mut state = self.state.lock().await;
        if !state.is_current(stamp) {
            tracing::debug!(
                session_id = stamp.session_id,
                "Discarding stream update for an inactive session"
            );
            return;
        }

        match state.messages.last_mut() {
            Some(last) => *last = message.clone(),
            None => state.messages.push(message.clone()),
        }
        self.mirror(&state).await;
        self.notify(Event::MessageUpdated(message));
    }

    /// Fetches the session list for the sidebar. Failures leave the previous
    /// list in place.
    pub async fn refresh_sessions(&self) {
        let sessions = match self.backend.list_sessions().await {
            Ok(sessions) => sessions,
            Err(err) => {
                tracing::debug!(error = ?err, "Failed to refresh session list");
                return;
            }
        };

        let mut state = self.state.lock().await;
        state.sessions = sessions.clone();
        self.notify(Event::SessionsListed(sessions));
    }

    /// Activates a fresh session id. Callers hold the state lock.
    async fn begin_session(&self, state: &mut ControllerState) -> String {
        let session_id = Session::create_id();
        state.activate(Some(session_id.to_string()), vec![]);
        self.mirror(state).await;
        self.notify(Event::LogReplaced(Some(session_id.to_string()), vec![]));
        tracing::info!(session_id, "Created session");

        return session_id;
    }

    async fn register_session(&self, session_id: &str) {
        if let Err(err) = self.backend.register_session(session_id).await {
            tracing::warn!(error = ?err, session_id, "Failed to register session, continuing locally");
        }
    }

    /// Starts a new, empty session and makes it active. Registration with the
    /// backend is best effort.
    pub async fn create_session(&self) -> String {
        let session_id = {
            let mut state = self.state.lock().await;
            self.begin_session(&mut state).await
        };

        self.register_session(&session_id).await;
        self.refresh_sessions().await;
        return session_id;
    }

    /// Makes `session_id` active. The log is emptied before anything else
    /// happens, then replaced by the backend's history if it can be fetched.
    pub async fn select_session(&self, session_id: &str) {
        let stamp = self.activate(session_id, vec![]).await;
        tracing::info!(session_id, "Selected session");
        self.load_history(&stamp).await;
    }

    /// Deletes a session on the backend, then forgets it locally. Backend
    /// failures are returned and leave local state as it was.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.backend.delete_session(session_id).await?;
        tracing::info!(session_id, "Deleted session");

        {
            let mut state = self.state.lock().await;
            state.sessions.retain(|session| return session.session_id != session_id);
            if state.active_session_id.as_deref() == Some(session_id) {
                state.activate(None, vec![]);
                self.mirror(&state).await;
                self.notify(Event::LogReplaced(None, vec![]));
            } else {
                self.forget_cached(session_id).await;
            }
        }

        self.refresh_sessions().await;
        return Ok(());
    }

    /// Clears the store slot if it still holds `session_id`, which happens when
    /// this process never activated the cached session.
    async fn forget_cached(&self, session_id: &str) {
        match self.store.load_active().await {
            Ok(Some(cached)) if cached.active_session_id == session_id => {
                if let Err(err) = self.store.clear_active().await {
                    tracing::warn!(error = ?err, session_id, "Failed to clear cached session");
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = ?err, "Failed to load cached session");
            }
        }
    }

    /// Reactivates the session cached by the store after a restart. Cached
    /// messages are shown until the backend's history supersedes them.
    pub async fn restore(&self) -> Option<String> {
        let cached = match self.store.load_active().await {
            Ok(Some(cached)) => cached,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = ?err, "Failed to load cached session");
                return None;
            }
        };

        let messages = cached
            .active_messages
            .into_iter()
            .map(Message::settled)
            .collect::<Vec<Message>>();
        let stamp = self.activate(&cached.active_session_id, messages).await;
        tracing::info!(session_id = stamp.session_id, "Restored cached session");
        self.load_history(&stamp).await;

        return Some(stamp.session_id);
    }

    /// Sends `text` on the active session, creating one first if needed, and
    /// streams the reply into the trailing message of the log.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }

        let (stamp, created) = {
            let mut state = self.state.lock().await;
            let active_session_id = state.active_session_id.clone();
            let (session_id, created) = match active_session_id {
                Some(session_id) => (session_id, false),
                None => (self.begin_session(&mut state).await, true),
            };
            if state.in_flight.contains(&session_id) {
                tracing::debug!(session_id, "Send already in flight");
                return SendOutcome::Busy;
            }

            state.in_flight.insert(session_id.to_string());
            let user_message = Message::user(text);
            state.messages.push(user_message.clone());
            state.messages.push(Message::placeholder());
            state.local_appends += 2;
            self.mirror(&state).await;
            self.notify(Event::MessageAppended(user_message));
            self.notify(Event::MessageAppended(Message::placeholder()));

            let epoch = state.epoch;
            (Stamp { session_id, epoch }, created)
        };

        if created {
            self.register_session(&stamp.session_id).await;
        }
        let outcome = self.stream_reply(&stamp, text).await;

        {
            let mut state = self.state.lock().await;
            state.in_flight.remove(&stamp.session_id);
        }
        self.refresh_sessions().await;

        return outcome;
    }

    async fn stream_reply(&self, stamp: &Stamp, text: &str) -> SendOutcome {
        let body = match self.backend.chat(&stamp.session_id, text).await {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(error = ?err, session_id = stamp.session_id, "Chat request failed");
                self.apply_update(stamp, Message::failed()).await;
                return SendOutcome::Failed;
            }
        };

        let mut applier = StampedApplier {
            controller: self.clone(),
            stamp: stamp.clone(),
        };
        match StreamReducer::consume(body, &mut applier).await {
            Ok(last) => {
                tracing::debug!(
                    session_id = stamp.session_id,
                    length = last.content.len(),
                    "Chat stream completed"
                );
                return SendOutcome::Completed;
            }
            Err(err) => {
                tracing::error!(error = ?err, session_id = stamp.session_id, "Chat stream failed");
                return SendOutcome::Failed;
            }
        }
    }

    /// Uploads a document for ingestion. Always answers with a short status
    /// line for the user.
    pub async fn upload(&self, path: &Path) -> String {
        if let Err(err) = validate_upload(path) {
            return format!("Upload failed: {err}");
        }

        match self.backend.ingest_file(path).await {
            Ok(message) => return message,
            Err(err) => {
                tracing::warn!(error = ?err, path = ?path, "Upload failed");
                return format!("Upload failed: {err}");
            }
        }
    }

    /// Uploads inline text for ingestion under `filename`. Always answers
    /// with a short status line for the user.
    pub async fn upload_text(&self, text: &str, filename: &str) -> String {
        if text.trim().is_empty() {
            return "Upload failed: text cannot be empty".to_string();
        }
        let filename = match filename.trim() {
            "" => DEFAULT_TEXT_FILENAME,
            filename => filename,
        };

        match self.backend.ingest_text(text, filename).await {
            Ok(message) => return message,
            Err(err) => {
                tracing::warn!(error = ?err, filename, "Upload failed");
                return format!("Upload failed: {err}");
            }
        }
    }
}
