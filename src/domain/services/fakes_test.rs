use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use futures::channel::mpsc as body_channel;
use futures::stream;
use futures::StreamExt;
use tokio::sync::Notify;

use crate::domain::models::Backend;
use crate::domain::models::ByteStream;
use crate::domain::models::Message;
use crate::domain::models::Session;

pub type BodySender = body_channel::UnboundedSender<Result<Vec<u8>>>;

/// Scriptable in-process backend. Chat replies are served in the order they
/// were queued; an empty queue answers with an error status.
#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<String>>,
    pub sessions: Mutex<Vec<Session>>,
    pub histories: Mutex<HashMap<String, Vec<Message>>>,
    pub history_gate: Mutex<Option<Arc<Notify>>>,
    pub chat_bodies: Mutex<VecDeque<ByteStream>>,
    pub fail_register: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_list: AtomicBool,
}

impl FakeBackend {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        return self.calls.lock().unwrap().clone();
    }

    pub fn set_history(&self, id: &str, messages: Vec<Message>) {
        self.histories
            .lock()
            .unwrap()
            .insert(id.to_string(), messages);
    }

    /// Holds every history fetch until the returned gate is notified.
    pub fn gate_history(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.history_gate.lock().unwrap() = Some(gate.clone());
        return gate;
    }

    pub fn queue_chat_body(&self, raw: &str) {
        let chunks = vec![Ok::<Vec<u8>, anyhow::Error>(raw.as_bytes().to_vec())];
        self.chat_bodies
            .lock()
            .unwrap()
            .push_back(stream::iter(chunks).boxed());
    }

    /// Queues a reply whose chunks are pushed by the test. The body ends when
    /// the sender is dropped.
    pub fn queue_chat_channel(&self) -> BodySender {
        let (tx, rx) = body_channel::unbounded::<Result<Vec<u8>>>();
        self.chat_bodies.lock().unwrap().push_back(rx.boxed());
        return tx;
    }
}

#[async_trait]
impl Backend for Arc<FakeBackend> {
    async fn health_check(&self) -> Result<()> {
        return Ok(());
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.record("list".to_string());
        if self.fail_list.load(Ordering::SeqCst) {
            bail!("backend unavailable");
        }

        return Ok(self.sessions.lock().unwrap().clone());
    }

    async fn register_session(&self, id: &str) -> Result<()> {
        self.record(format!("register:{id}"));
        if self.fail_register.load(Ordering::SeqCst) {
            bail!("backend unavailable");
        }

        self.sessions.lock().unwrap().push(Session {
            session_id: id.to_string(),
            title: None,
            message_count: 0,
        });
        return Ok(());
    }

    async fn history(&self, id: &str) -> Result<Vec<Message>> {
        self.record(format!("history:{id}"));
        let gate = self.history_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.histories.lock().unwrap().get(id) {
            Some(messages) => return Ok(messages.clone()),
            None => bail!("session {id} not found"),
        }
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        self.record(format!("delete:{id}"));
        if self.fail_delete.load(Ordering::SeqCst) {
            bail!("backend unavailable");
        }

        self.sessions
            .lock()
            .unwrap()
            .retain(|session| return session.session_id != id);
        return Ok(());
    }

    async fn chat(&self, id: &str, text: &str) -> Result<ByteStream> {
        self.record(format!("chat:{id}:{text}"));
        let body = self.chat_bodies.lock().unwrap().pop_front();
        match body {
            Some(body) => return Ok(body),
            None => bail!("Chat request failed with status 503"),
        }
    }

    async fn ingest_file(&self, path: &Path) -> Result<String> {
        self.record(format!("ingest:{}", path.display()));
        return Ok("Ingested 1 chunk(s)".to_string());
    }

    async fn ingest_text(&self, text: &str, filename: &str) -> Result<String> {
        self.record(format!("ingest-text:{filename}:{text}"));
        return Ok(format!("Ingested 1 chunk(s) from '{filename}'"));
    }
}
