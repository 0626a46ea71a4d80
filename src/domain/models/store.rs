use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use super::Message;

/// The single slot mirrored to local storage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub active_session_id: String,
    pub active_messages: Vec<Message>,
}

/// Crash recovery cache for the active session. Never the source of truth
/// while a session is live; only read back after a restart.
#[async_trait]
pub trait SessionStore {
    async fn save_active(&self, id: &str, messages: &[Message]) -> Result<()>;

    async fn load_active(&self) -> Result<Option<ActiveSession>>;

    async fn clear_active(&self) -> Result<()>;
}

pub type StoreBox = Box<dyn SessionStore + Send + Sync>;
