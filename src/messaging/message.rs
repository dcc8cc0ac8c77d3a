use bytes::Bytes;
use chrono::{DateTime, Local};
use std::fmt;

const PREVIEW_LEN: usize = 64;

/// A publish received on a subscribed topic.
///
/// `length` is the payload length declared by the transport. Only
/// `payload[..length]` is ever interpreted; bytes past it are ignored and a
/// length larger than the buffer yields no body at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    topic: String,
    payload: Bytes,
    length: usize,
    received_at: DateTime<Local>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let length = payload.len();
        Self::with_declared_length(topic, payload, length)
    }

    pub fn with_declared_length(
        topic: impl Into<String>,
        payload: impl Into<Bytes>,
        length: usize,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            length,
            received_at: Local::now(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// The declared payload, or `None` when the buffer is shorter than declared.
    pub fn body(&self) -> Option<&[u8]> {
        self.payload.get(..self.length)
    }

    /// Lossy UTF-8 rendering of the body for logs, capped in length.
    pub fn preview(&self) -> String {
        match self.body() {
            Some(body) => {
                let shown = &body[..body.len().min(PREVIEW_LEN)];
                let mut text = String::from_utf8_lossy(shown).into_owned();
                if body.len() > PREVIEW_LEN {
                    text.push_str("...");
                }
                text
            }
            None => format!(
                "<declared {} bytes, buffer holds {}>",
                self.length,
                self.payload.len()
            ),
        }
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.received_at.format("%H:%M:%S%.3f"),
            self.topic,
            self.preview()
        )
    }
}
