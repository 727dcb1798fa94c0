//! Output rendering for the chat terminal.
//!
//! This module provides the [`Renderer`] trait, a plain-text implementation
//! with optional ANSI styling, and [`TerminalView`], which follows a
//! [`Conversation`](crate::Conversation) and prints assistant answers as they
//! stream in.

use std::io::{self, Write};

use crate::conversation::{ConversationObserver, MessageChange};
use crate::format::{segment_spans, settled_prose_len};
use crate::types::{DisplaySegment, Message, MessageId, MessageRole, MessageStatus};

/// ANSI escape code for dim text (used for block numbers).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for code block labels).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for code block bodies).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for the copied marker).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering streaming output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
pub trait Renderer: Send {
    /// Print a chunk of prose.
    fn print_text(&mut self, text: &str);

    /// Print a complete code block. `number` is one-based within its message.
    fn print_code_block(&mut self, number: usize, label: &str, body: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    out: Box<dyn Write + Send>,
    use_color: bool,
    line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(Box::new(io::stdout()), use_color)
    }

    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: Box<dyn Write + Send>, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            line_start: true,
        }
    }

    /// Returns true if ANSI styling is enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    // Output is best effort; a closed terminal must not abort the exchange.
    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.line_start = text.ends_with('\n');
    }

    fn ensure_line_start(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        self.write(text);
    }

    fn print_code_block(&mut self, number: usize, label: &str, body: &str) {
        self.ensure_line_start();
        if self.use_color {
            self.write(&format!(
                "{ANSI_CYAN}[{label}]{ANSI_RESET} {ANSI_DIM}#{number}{ANSI_RESET}\n{ANSI_YELLOW}{body}{ANSI_RESET}"
            ));
        } else {
            self.write(&format!("[{label}] #{number}\n{body}"));
        }
        self.ensure_line_start();
    }

    fn print_error(&mut self, error: &str) {
        self.ensure_line_start();
        if self.use_color {
            self.write(&format!("{ANSI_RED}{error}{ANSI_RESET}\n"));
        } else {
            self.write(&format!("{error}\n"));
        }
    }

    fn print_info(&mut self, info: &str) {
        self.ensure_line_start();
        self.write(&format!("{info}\n"));
    }

    fn finish_response(&mut self) {
        self.ensure_line_start();
    }
}

/// Formats the "copied" marker shown next to a block listing.
pub fn copied_marker(use_color: bool) -> String {
    if use_color {
        format!("{ANSI_GREEN}Copied!{ANSI_RESET}")
    } else {
        "Copied!".to_string()
    }
}

/// How far the view has printed the message that is streaming.
#[derive(Debug, Clone, Copy)]
struct Progress {
    id: MessageId,
    printed: usize,
    blocks: usize,
}

/// Prints assistant answers incrementally as the conversation changes.
///
/// Only text that later deltas can no longer reinterpret is printed while a
/// message streams: closed code blocks, and prose up to the first fence that
/// has not closed yet. Everything else waits for the message to complete.
pub struct TerminalView<R: Renderer> {
    renderer: R,
    progress: Option<Progress>,
}

impl<R: Renderer> TerminalView<R> {
    /// Creates a view that prints through `renderer`.
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            progress: None,
        }
    }

    /// Borrows the renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    fn render(&mut self, message: &Message, complete: bool) {
        let Some(mut progress) = self.progress.filter(|progress| progress.id == message.id) else {
            return;
        };
        let text = message.text.as_str();
        let spans = segment_spans(text);
        let settled = if complete {
            text.len()
        } else {
            match spans.last() {
                Some(last) => match &last.segment {
                    DisplaySegment::Code { .. } => last.span.end,
                    DisplaySegment::Prose { text } => last.span.start + settled_prose_len(text),
                },
                None => 0,
            }
        };

        for spanned in spans {
            if spanned.span.start >= settled {
                break;
            }
            if spanned.span.end <= progress.printed {
                continue;
            }
            match &spanned.segment {
                DisplaySegment::Code { body, .. } => {
                    progress.blocks += 1;
                    let label = spanned.segment.label().unwrap_or("code");
                    self.renderer.print_code_block(progress.blocks, label, body);
                    progress.printed = spanned.span.end;
                }
                DisplaySegment::Prose { .. } => {
                    let from = progress.printed.max(spanned.span.start);
                    let to = spanned.span.end.min(settled);
                    if from < to {
                        self.renderer.print_text(&text[from..to]);
                        progress.printed = to;
                    }
                }
            }
        }
        self.progress = Some(progress);
    }
}

impl<R: Renderer> ConversationObserver for TerminalView<R> {
    fn message_changed(&mut self, message: &Message, change: MessageChange) {
        if message.role != MessageRole::Assistant {
            return;
        }
        match change {
            MessageChange::Appended => {
                self.progress = Some(Progress {
                    id: message.id,
                    printed: 0,
                    blocks: 0,
                });
            }
            MessageChange::Extended => self.render(message, false),
            MessageChange::Finalized => {
                match message.status {
                    MessageStatus::Failed => self.renderer.print_error(&message.text),
                    _ => {
                        self.render(message, true);
                        self.renderer.finish_response();
                    }
                }
                self.progress = None;
            }
        }
    }

    fn conversation_cleared(&mut self) {
        self.progress = None;
    }
}
