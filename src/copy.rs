//! Copying code blocks and the transient "copied" indicator.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::format::segment;
use crate::types::{DisplaySegment, Message, MessageId};
use crate::{Error, Result};

/// How long a code block shows as copied.
pub const COPIED_INDICATOR: Duration = Duration::from_secs(2);

/// Identifies a code block independently of the prose around it.
///
/// `ordinal` counts code segments only, in the order they appear in the
/// message. Text only ever grows at the end of a message, so a closed block
/// keeps its ordinal while prose and later blocks come and go around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeBlockKey {
    /// The message containing the block.
    pub message: MessageId,
    /// Zero-based position among the message's code blocks.
    pub ordinal: usize,
}

/// Returns the code blocks of a segment list as `(ordinal, language, body)`.
pub fn code_blocks(segments: &[DisplaySegment]) -> Vec<(usize, &str, &str)> {
    segments
        .iter()
        .filter_map(|segment| match segment {
            DisplaySegment::Code { language, body } => Some((language.as_str(), body.as_str())),
            DisplaySegment::Prose { .. } => None,
        })
        .enumerate()
        .map(|(ordinal, (language, body))| (ordinal, language, body))
        .collect()
}

/// Destination for copied text.
pub trait Clipboard {
    /// Replace the clipboard contents with `text`.
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// Tracks which code blocks were copied recently.
#[derive(Debug)]
pub struct CopyTracker {
    ttl: Duration,
    copied: HashMap<CodeBlockKey, Instant>,
}

impl CopyTracker {
    /// Creates a tracker using [`COPIED_INDICATOR`].
    pub fn new() -> Self {
        Self::with_ttl(COPIED_INDICATOR)
    }

    /// Creates a tracker with a custom indicator duration.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            copied: HashMap::new(),
        }
    }

    /// Copies `body` to `clipboard` and marks the block as copied at `now`.
    pub fn copy(
        &mut self,
        clipboard: &mut dyn Clipboard,
        key: CodeBlockKey,
        body: &str,
        now: Instant,
    ) -> Result<()> {
        clipboard.set_text(body)?;
        self.mark_copied(key, now);
        Ok(())
    }

    /// Marks a block as copied at `now`.
    pub fn mark_copied(&mut self, key: CodeBlockKey, now: Instant) {
        self.prune(now);
        self.copied.insert(key, now);
    }

    /// Returns true if `key` was copied less than the indicator duration before `now`.
    pub fn is_copied(&self, key: CodeBlockKey, now: Instant) -> bool {
        self.copied
            .get(&key)
            .is_some_and(|at| now.saturating_duration_since(*at) < self.ttl)
    }

    /// Forgets indicators that have expired by `now`.
    pub fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.copied
            .retain(|_, at| now.saturating_duration_since(*at) < ttl);
    }

    /// Forgets every indicator.
    pub fn clear(&mut self) {
        self.copied.clear();
    }

    /// Number of indicators currently held, expired or not.
    pub fn len(&self) -> usize {
        self.copied.len()
    }

    /// Returns true if no indicator is held.
    pub fn is_empty(&self) -> bool {
        self.copied.is_empty()
    }
}

impl Default for CopyTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a user-supplied, one-based block number against `count` blocks.
///
/// `None` selects the last block.
pub fn select_block(number: Option<usize>, count: usize) -> Result<usize> {
    if count == 0 {
        return Err(Error::validation("no code blocks to copy", None));
    }
    match number {
        None => Ok(count - 1),
        Some(n) if (1..=count).contains(&n) => Ok(n - 1),
        Some(n) => Err(Error::validation(
            format!("block {n} does not exist; there are {count} code blocks"),
            Some("block".to_string()),
        )),
    }
}

/// Copy code block `number` (one-based, `None` for the last) of `message`.
///
/// Returns the key of the copied block.
pub fn copy_from_message(
    tracker: &mut CopyTracker,
    clipboard: &mut dyn Clipboard,
    message: &Message,
    number: Option<usize>,
    now: Instant,
) -> Result<CodeBlockKey> {
    let segments = segment(&message.text);
    let blocks = code_blocks(&segments);
    let index = select_block(number, blocks.len())?;
    let (ordinal, _, body) = blocks[index];
    let key = CodeBlockKey {
        message: message.id,
        ordinal,
    };
    tracker.copy(clipboard, key, body, now)?;
    tracing::debug!(message = %message.id, ordinal, "code block copied");
    Ok(key)
}
