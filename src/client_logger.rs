//! Logging trait for chat exchanges.
//!
//! This module provides the [`ClientLogger`] trait that allows callers to capture
//! every request a [`ChatSession`](crate::chat::ChatSession) sends and every
//! event it receives.

use crate::{ChatRequest, Message, ProtocolEvent};

/// A trait for logging chat exchanges.
///
/// # Example
///
/// ```rust,ignore
/// use palaver::{ChatRequest, ClientLogger, Message, ProtocolEvent};
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_request(&self, request: &ChatRequest) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Request: {}", serde_json::to_string(request).unwrap()).unwrap();
///     }
///
///     fn log_stream_event(&self, event: &ProtocolEvent) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Event: {event:?}").unwrap();
///     }
///
///     fn log_exchange(&self, message: &Message) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Answer: {}", serde_json::to_string(message).unwrap()).unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log a request just before it is sent.
    fn log_request(&self, request: &ChatRequest);

    /// Log an individual protocol event as it is decoded.
    fn log_stream_event(&self, event: &ProtocolEvent);

    /// Log the assistant message once it reached a final status.
    fn log_exchange(&self, message: &Message);
}
