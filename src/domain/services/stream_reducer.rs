#[cfg(test)]
#[path = "stream_reducer_test.rs"]
mod tests;

use std::io::Cursor;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use serde_derive::Deserialize;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

use crate::domain::models::ByteStream;
use crate::domain::models::Message;

fn convert_err(err: anyhow::Error) -> std::io::Error {
    let err_msg = err.to_string();
    return std::io::Error::new(std::io::ErrorKind::Interrupted, err_msg);
}

/// Receives every message state the reducer produces, in decode order.
#[async_trait]
pub trait StreamObserver: Send {
    async fn on_update(&mut self, message: Message) -> Result<()>;
}

#[async_trait]
impl StreamObserver for mpsc::UnboundedSender<Message> {
    async fn on_update(&mut self, message: Message) -> Result<()> {
        self.send(message)?;
        return Ok(());
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
struct FramePayload {
    token: Option<String>,
    #[serde(default)]
    done: bool,
    sources: Option<Vec<String>>,
}

#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Token(String),
    Done(Vec<String>),
}

fn parse_frame(data: &str) -> Option<Frame> {
    let payload = match serde_json::from_str::<FramePayload>(data) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(error = ?err, data, "Skipping malformed stream frame");
            return None;
        }
    };

    if payload.done {
        return Some(Frame::Done(payload.sources.unwrap_or_default()));
    }
    if let Some(token) = payload.token {
        return Some(Frame::Token(token));
    }

    tracing::debug!(data, "Skipping unrecognized stream frame");
    return None;
}

/// Groups SSE lines into events. Only `data` fields are kept; a blank line
/// closes the event and yields its data lines joined by `\n`.
#[derive(Default, Debug)]
pub struct FrameDecoder {
    data: Vec<String>,
}

impl FrameDecoder {
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return self.flush();
        }

        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.data.push(value.to_string());
        }

        return None;
    }

    /// Closes whatever event is pending, used at end of stream.
    pub fn flush(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }

        let payload = self.data.join("\n");
        self.data.clear();
        return Some(payload);
    }
}

/// Folds the SSE body of one chat response into successive states of a single
/// assistant message.
#[derive(Default)]
pub struct StreamReducer {
    content: String,
    decoder: FrameDecoder,
}

impl StreamReducer {
    /// Consumes `body` until a terminal frame or end of stream. The observer
    /// always sees exactly one message with `streaming = false`, which is also
    /// returned. Transport failures surface as `Message::failed()` followed by
    /// an error.
    pub async fn consume<O: StreamObserver>(body: ByteStream, observer: &mut O) -> Result<Message> {
        let mut reducer = StreamReducer::default();
        let stream = body.map_ok(Cursor::new).map_err(convert_err);
        let mut reader = StreamReader::new(stream);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(error = ?err, "Chat stream was interrupted");
                    observer.on_update(Message::failed()).await?;
                    return Err(anyhow::Error::new(err).context("Chat stream was interrupted"));
                }
            }

            // Invalid bytes only cost the characters they encode.
            let line = String::from_utf8_lossy(&buf);
            let line = line.strip_suffix('\n').unwrap_or(&line);
            if let Some(data) = reducer.decoder.push_line(line) {
                if let Some(last) = reducer.apply(&data, observer).await? {
                    return Ok(last);
                }
            }
        }

        if let Some(data) = reducer.decoder.flush() {
            if let Some(last) = reducer.apply(&data, observer).await? {
                return Ok(last);
            }
        }

        tracing::warn!(
            length = reducer.content.len(),
            "Chat stream ended without a done frame"
        );
        let last = Message::finished(&reducer.content, vec![]);
        observer.on_update(last.clone()).await?;

        return Ok(last);
    }

    async fn apply<O: StreamObserver>(
        &mut self,
        data: &str,
        observer: &mut O,
    ) -> Result<Option<Message>> {
        match parse_frame(data) {
            Some(Frame::Token(token)) => {
                self.content += &token;
                observer.on_update(Message::partial(&self.content)).await?;
                return Ok(None);
            }
            Some(Frame::Done(sources)) => {
                let last = Message::finished(&self.content, sources);
                observer.on_update(last.clone()).await?;
                return Ok(Some(last));
            }
            None => return Ok(None),
        }
    }
}
