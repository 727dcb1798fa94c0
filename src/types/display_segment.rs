use std::ops::Range;

/// A contiguous, typed slice of message text prepared for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaySegment {
    /// Free text, shown as-is.
    Prose {
        /// The text.
        text: String,
    },
    /// A fenced code block.
    Code {
        /// Language tag from the opening fence line; empty when absent.
        language: String,
        /// Code lines, newlines preserved.
        body: String,
    },
}

impl DisplaySegment {
    /// Create a prose segment.
    pub fn prose(text: impl Into<String>) -> Self {
        DisplaySegment::Prose { text: text.into() }
    }

    /// Create a code segment.
    pub fn code(language: impl Into<String>, body: impl Into<String>) -> Self {
        DisplaySegment::Code {
            language: language.into(),
            body: body.into(),
        }
    }

    /// Returns true for code segments.
    pub fn is_code(&self) -> bool {
        matches!(self, DisplaySegment::Code { .. })
    }

    /// The label to show above a code block: its language, or `"code"`.
    pub fn label(&self) -> Option<&str> {
        match self {
            DisplaySegment::Code { language, .. } if language.is_empty() => Some("code"),
            DisplaySegment::Code { language, .. } => Some(language),
            DisplaySegment::Prose { .. } => None,
        }
    }
}

/// A display segment together with the byte range of the source text it covers.
///
/// For code segments the range includes both fences and the language line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedSegment {
    /// Byte range in the source text.
    pub span: Range<usize>,
    /// The segment itself.
    pub segment: DisplaySegment,
}
