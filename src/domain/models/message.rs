#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

/// Shown in place of an answer when the chat stream fails at the transport
/// level.
pub const STREAM_ERROR_TEXT: &str =
    "Sorry, I couldn't reach the server to answer that. Please try again.";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Citations attached by the terminal stream frame. `None` until the
    /// stream for this message completes.
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub streaming: bool,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Message {
        return Message {
            role,
            content: content.to_string(),
            sources: None,
            streaming: false,
        };
    }

    pub fn user(content: &str) -> Message {
        return Message::new(Role::User, content);
    }

    /// Empty assistant message holding the log position the stream will fill.
    pub fn placeholder() -> Message {
        return Message::partial("");
    }

    pub fn partial(content: &str) -> Message {
        return Message {
            role: Role::Assistant,
            content: content.to_string(),
            sources: None,
            streaming: true,
        };
    }

    pub fn finished(content: &str, sources: Vec<String>) -> Message {
        return Message {
            role: Role::Assistant,
            content: content.to_string(),
            sources: Some(sources),
            streaming: false,
        };
    }

    pub fn failed() -> Message {
        return Message::finished(STREAM_ERROR_TEXT, vec![]);
    }

    /// Messages loaded from history are never in flight.
    pub fn settled(mut self) -> Message {
        self.streaming = false;
        return self;
    }
}
