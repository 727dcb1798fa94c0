//! Chat application module for interactive conversations with a chat service.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! palaver client library. It supports:
//!
//! - Streaming responses with incremental display of prose and code blocks
//! - File attachments
//! - Copying code blocks from the last answer
//! - Slash commands for session control
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Conversation ownership and streaming exchanges
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer, TerminalView};
pub use commands::{ChatCommand, help_text, parse_command, should_send};
pub use config::{BASE_URL_ENV, ChatArgs, ChatConfig, ConfigFile, DEFAULT_BASE_URL};
pub use session::{
    ChatSession, ExchangeOutcome, INTERRUPT_POLL, INTERRUPTED, SessionStats, UNTERMINATED,
};
