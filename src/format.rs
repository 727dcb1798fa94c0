//! Splitting message text into prose and fenced code segments.

use crate::types::{DisplaySegment, SpannedSegment};

/// The fence delimiter.
pub const FENCE: &str = "```";

/// Split `text` into display segments.
///
/// Every "```" … "```" pair (the closing fence is the nearest one after the
/// opening fence, and the pair may span lines) becomes a code segment. The
/// first line inside the fences is the language tag, trimmed, and is not part
/// of the body; the remaining lines are the body, verbatim. Text outside the
/// pairs becomes prose, and empty prose is dropped. An opening fence without a
/// closing fence is left in the prose untouched, which is what a response that
/// is still streaming looks like.
///
/// ```
/// use palaver::{DisplaySegment, segment};
///
/// assert_eq!(
///     segment("a ```py\nprint(1)\n``` b"),
///     vec![
///         DisplaySegment::prose("a "),
///         DisplaySegment::code("py", "print(1)\n"),
///         DisplaySegment::prose(" b"),
///     ]
/// );
/// ```
pub fn segment(text: &str) -> Vec<DisplaySegment> {
    segment_spans(text)
        .into_iter()
        .map(|spanned| spanned.segment)
        .collect()
}

/// Like [`segment`], but also reports the byte range each segment covers.
pub fn segment_spans(text: &str) -> Vec<SpannedSegment> {
    let mut segments = Vec::new();
    let mut prose_start = 0;
    let mut cursor = 0;

    while let Some(open) = text[cursor..].find(FENCE).map(|at| cursor + at) {
        let content_start = open + FENCE.len();
        let Some(close) = text[content_start..].find(FENCE).map(|at| content_start + at) else {
            break;
        };
        let end = close + FENCE.len();

        push_prose(&mut segments, text, prose_start..open);
        segments.push(SpannedSegment {
            span: open..end,
            segment: code_block(&text[content_start..close]),
        });
        prose_start = end;
        cursor = end;
    }

    push_prose(&mut segments, text, prose_start..text.len());
    segments
}

/// The number of leading bytes of `prose` that later text can no longer turn
/// into part of a code block.
///
/// Applies to the last segment of a growing message: everything from its first
/// fence onwards is an unterminated block that may still close, and a trailing
/// run of one or two backticks may still grow into a fence.
pub fn settled_prose_len(prose: &str) -> usize {
    if let Some(open) = prose.find(FENCE) {
        return open;
    }
    let trailing = prose.len() - prose.trim_end_matches('`').len();
    prose.len() - trailing
}

fn push_prose(segments: &mut Vec<SpannedSegment>, text: &str, span: std::ops::Range<usize>) {
    if span.is_empty() {
        return;
    }
    segments.push(SpannedSegment {
        segment: DisplaySegment::prose(&text[span.clone()]),
        span,
    });
}

fn code_block(content: &str) -> DisplaySegment {
    let (language, body) = content.split_once('\n').unwrap_or((content, ""));
    DisplaySegment::code(language.trim(), body)
}
