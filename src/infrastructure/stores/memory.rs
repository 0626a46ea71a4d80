use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::models::ActiveSession;
use crate::domain::models::Message;
use crate::domain::models::SessionStore;

/// Process local store. Clones share the same slot.
#[derive(Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<ActiveSession>>>,
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save_active(&self, id: &str, messages: &[Message]) -> Result<()> {
        *self.slot.lock().await = Some(ActiveSession {
            active_session_id: id.to_string(),
            active_messages: messages.to_vec(),
        });

        return Ok(());
    }

    async fn load_active(&self) -> Result<Option<ActiveSession>> {
        return Ok(self.slot.lock().await.clone());
    }

    async fn clear_active(&self) -> Result<()> {
        *self.slot.lock().await = None;
        return Ok(());
    }
}
