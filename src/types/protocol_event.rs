use serde::Deserialize;

/// One decoded unit of meaning from a response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// A fragment of the answer text.
    TextDelta {
        /// The fragment, to be appended verbatim.
        chunk: String,
    },
    /// The service reported a failure; no further events follow.
    Error {
        /// The service's description of the failure.
        message: String,
    },
    /// The answer is complete; no further events follow.
    Done,
}

impl ProtocolEvent {
    /// Create a text delta event.
    pub fn text_delta(chunk: impl Into<String>) -> Self {
        ProtocolEvent::TextDelta {
            chunk: chunk.into(),
        }
    }

    /// Create an error event.
    pub fn error(message: impl Into<String>) -> Self {
        ProtocolEvent::Error {
            message: message.into(),
        }
    }

    /// Returns true if the stream ends after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProtocolEvent::Error { .. } | ProtocolEvent::Done)
    }
}

/// The JSON object carried by a `data: ` line.
///
/// The shapes are mutually exclusive; variants are tried in declaration order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum StreamPayload {
    Text { text: String },
    Error { error: String },
    Done { done: bool },
}

impl StreamPayload {
    /// Converts the payload into an event; `{"done": false}` carries nothing.
    pub(crate) fn into_event(self) -> Option<ProtocolEvent> {
        match self {
            StreamPayload::Text { text } => Some(ProtocolEvent::TextDelta { chunk: text }),
            StreamPayload::Error { error } => Some(ProtocolEvent::Error { message: error }),
            StreamPayload::Done { done: true } => Some(ProtocolEvent::Done),
            StreamPayload::Done { done: false } => None,
        }
    }
}
