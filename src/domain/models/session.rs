use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message_count: u64,
}

impl Session {
    /// Generates a new client side session id. Uses a full v4 UUID so ids
    /// created within one process never collide.
    pub fn create_id() -> String {
        return format!("session-{}", Uuid::new_v4().simple());
    }

    pub fn display_title(&self) -> String {
        if let Some(title) = &self.title {
            if !title.trim().is_empty() {
                return title.to_string();
            }
        }

        return "New Chat".to_string();
    }
}
