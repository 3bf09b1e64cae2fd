//! Server-sent events.

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

/// One server-sent event.
///
/// A streaming handler that yields `ServerSentEvent`s is served as
/// `text/event-stream`.
///
/// ```rust
/// use merino_core::ServerSentEvent;
///
/// let event = ServerSentEvent::new("line one\nline two").event("update").id("7");
/// assert_eq!(
///     event.to_bytes(),
///     "id: 7\nevent: update\ndata: line one\ndata: line two\n\n"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerSentEvent {
    id: Option<String>,
    event: Option<String>,
    data: String,
    retry: Option<Duration>,
    comment: Option<String>,
}

impl ServerSentEvent {
    /// An event carrying `data`.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// An event carrying `value` serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns the serialization error.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_string(value).map(Self::new)
    }

    /// Sets the event id.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the event type.
    #[must_use]
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Sets the client's reconnection delay.
    #[must_use]
    pub fn retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Adds a comment line, ignored by clients.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The event data.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// The wire form: one `field: value` line per field, then a blank line.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = String::with_capacity(self.data.len() + 16);
        if let Some(comment) = &self.comment {
            for line in comment.lines() {
                out.push_str(": ");
                out.push_str(line);
                out.push('\n');
            }
        }
        if let Some(id) = &self.id {
            out.push_str("id: ");
            out.push_str(id);
            out.push('\n');
        }
        if let Some(event) = &self.event {
            out.push_str("event: ");
            out.push_str(event);
            out.push('\n');
        }
        if self.data.is_empty() {
            out.push_str("data: \n");
        }
        for line in self.data.lines() {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        if let Some(retry) = self.retry {
            out.push_str("retry: ");
            out.push_str(&retry.as_millis().to_string());
            out.push('\n');
        }
        out.push('\n');
        Bytes::from(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_event() {
        assert_eq!(ServerSentEvent::new("hi").to_bytes(), "data: hi\n\n");
        assert_eq!(ServerSentEvent::new("").to_bytes(), "data: \n\n");
    }

    #[test]
    fn test_retry_and_comment() {
        let event = ServerSentEvent::new("x")
            .retry(Duration::from_secs(3))
            .comment("keep-alive");
        assert_eq!(event.to_bytes(), ": keep-alive\ndata: x\nretry: 3000\n\n");
    }

    #[test]
    fn test_json_event() {
        let event = ServerSentEvent::json(&serde_json::json!({ "n": 1 })).unwrap();
        assert_eq!(event.data(), r#"{"n":1}"#);
    }
}
