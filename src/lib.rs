//! A streaming chat client.
//!
//! A response arrives as newline-delimited `data: {json}` lines. The
//! [`decoder`] turns byte chunks into [`ProtocolEvent`]s, the [`Conversation`]
//! folds those events into messages, and [`format`] splits message text into
//! prose and fenced code for display.

// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod conversation;
pub mod copy;
pub mod decoder;
pub mod error;
pub mod format;
pub mod render;
pub mod types;
pub mod utils;

mod observability;

// Re-exports
pub use chat::ChatConfig;
pub use client::{ByteStream, ChatClient, Transport};
pub use client_logger::ClientLogger;
pub use conversation::{Conversation, ConversationObserver, MessageChange, render_error};
pub use copy::{Clipboard, CodeBlockKey, CopyTracker};
pub use decoder::{ProtocolCodec, decode_stream};
pub use error::{Error, Result};
pub use format::{segment, segment_spans};
pub use observability::register_biometrics;
pub use types::*;
