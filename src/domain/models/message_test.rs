use anyhow::Result;

use super::Message;
use super::Role;
use super::STREAM_ERROR_TEXT;

#[test]
fn it_executes_placeholder() {
    let msg = Message::placeholder();
    assert_eq!(msg.role, Role::Assistant);
    assert_eq!(msg.content, "");
    assert_eq!(msg.sources, None);
    assert!(msg.streaming);
}

#[test]
fn it_executes_finished() {
    let msg = Message::finished("Hi there", vec!["doc1.md".to_string()]);
    assert_eq!(msg.role, Role::Assistant);
    assert_eq!(msg.content, "Hi there");
    assert_eq!(msg.sources, Some(vec!["doc1.md".to_string()]));
    assert!(!msg.streaming);
}

#[test]
fn it_executes_failed() {
    let msg = Message::failed();
    assert_eq!(msg.content, STREAM_ERROR_TEXT);
    assert_eq!(msg.sources, Some(vec![]));
    assert!(!msg.streaming);
}

#[test]
fn it_displays_roles_lowercase() {
    assert_eq!(Role::User.to_string(), "user");
    assert_eq!(Role::Assistant.to_string(), "assistant");
}

#[test]
fn it_deserializes_history_entries() -> Result<()> {
    let msg: Message = serde_json::from_str(r#"{"role": "assistant", "content": "Hello"}"#)?;
    assert_eq!(msg, Message::new(Role::Assistant, "Hello"));

    return Ok(());
}

#[test]
fn it_settles_streaming_messages() {
    let msg = Message::partial("Hel").settled();
    assert!(!msg.streaming);
    assert_eq!(msg.content, "Hel");
}
