use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use super::Message;
use super::Session;

/// Raw body of a chat response, one item per transport read.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

#[async_trait]
pub trait Backend {
    /// Used at startup to verify the backend is reachable.
    async fn health_check(&self) -> Result<()>;

    /// All sessions known to the backend, for the sidebar.
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// Registers a client generated session id. Safe to repeat.
    async fn register_session(&self, id: &str) -> Result<()>;

    /// Authoritative message history for a session.
    async fn history(&self, id: &str) -> Result<Vec<Message>>;

    async fn delete_session(&self, id: &str) -> Result<()>;

    /// Sends a chat message, returning the SSE response body unread. Non
    /// success statuses are errors.
    async fn chat(&self, id: &str, text: &str) -> Result<ByteStream>;

    /// Uploads a document for ingestion and returns the server's status
    /// message.
    async fn ingest_file(&self, path: &Path) -> Result<String>;

    /// Ingests inline text as a document named `filename`.
    async fn ingest_text(&self, text: &str, filename: &str) -> Result<String>;
}

pub type BackendBox = Box<dyn Backend + Send + Sync>;
