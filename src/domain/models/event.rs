use super::Message;
use super::Session;

/// Notifications from the session controller to whatever renders the chat.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The active session changed, or its log was replaced wholesale.
    LogReplaced(Option<String>, Vec<Message>),
    MessageAppended(Message),
    /// The trailing message of the active log was replaced.
    MessageUpdated(Message),
    SessionsListed(Vec<Session>),
}
