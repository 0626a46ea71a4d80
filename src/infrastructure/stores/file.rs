#[cfg(test)]
#[path = "file_test.rs"]
mod tests;

use std::path;

use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::models::ActiveSession;
use crate::domain::models::Message;
use crate::domain::models::SessionStore;

/// Mirrors the active session into a single YAML file.
pub struct FileStore {
    pub file_path: path::PathBuf,
}

impl FileStore {
    pub fn new(file_path: path::PathBuf) -> FileStore {
        return FileStore { file_path };
    }

    fn temp_path(&self) -> path::PathBuf {
        let mut temp = self.file_path.clone().into_os_string();
        temp.push(".tmp");
        return path::PathBuf::from(temp);
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn save_active(&self, id: &str, messages: &[Message]) -> Result<()> {
        let payload = serde_yaml::to_string(&ActiveSession {
            active_session_id: id.to_string(),
            active_messages: messages.to_vec(),
        })?;

        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write then rename, so a crash mid-write never leaves a torn file.
        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(payload.as_bytes()).await?;
        file.flush().await?;
        fs::rename(&temp_path, &self.file_path).await?;

        return Ok(());
    }

    async fn load_active(&self) -> Result<Option<ActiveSession>> {
        if !self.file_path.exists() {
            return Ok(None);
        }

        let payload = fs::read_to_string(&self.file_path).await?;
        let active: ActiveSession = serde_yaml::from_str(&payload).with_context(|| {
            return format!("Invalid session cache at {}", self.file_path.display());
        })?;

        return Ok(Some(active));
    }

    async fn clear_active(&self) -> Result<()> {
        if !self.file_path.exists() {
            return Ok(());
        }

        fs::remove_file(&self.file_path).await?;
        return Ok(());
    }
}
