//! Decoding of chat response streams.
//!
//! The chat service answers with newline-delimited text. Lines that start with
//! `data: ` carry a JSON object with exactly one of the shapes `{"text": ...}`,
//! `{"error": ...}` or `{"done": true}`; every other line is ignored. This
//! module turns the raw byte stream, split at arbitrary points by the transport,
//! into a stream of [`ProtocolEvent`]s.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use tokio_util::codec::Decoder;

use crate::observability::{
    STREAM_BYTES, STREAM_ERRORS, STREAM_EVENTS, STREAM_IGNORED_LINES, STREAM_MALFORMED_LINES,
};
use crate::types::StreamPayload;
use crate::{Error, ProtocolEvent, Result};

/// Prefix that marks a protocol line.
pub const DATA_PREFIX: &str = "data: ";

/// End-of-stream sentinel some servers send instead of `{"done": true}`.
const LEGACY_DONE: &str = "[DONE]";

/// Line framing and interpretation for the chat response protocol.
///
/// Bytes are buffered until a `\n` arrives, so chunk boundaries (including
/// ones that fall inside a multi-byte character) never change the decoded
/// events. Once an `Error` or `Done` event has been produced the codec is
/// finished and discards any further input.
#[derive(Debug, Default)]
pub struct ProtocolCodec {
    finished: bool,
    // Bytes of the buffer before this index are known to hold no `\n`.
    next_index: usize,
}

impl ProtocolCodec {
    /// Creates a codec that has not seen any input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once a terminal event has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn interpret(&mut self, line: &[u8]) -> Option<ProtocolEvent> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(payload) = line.strip_prefix(DATA_PREFIX.as_bytes()) else {
            if !line.is_empty() {
                STREAM_IGNORED_LINES.click();
            }
            return None;
        };

        let payload = match std::str::from_utf8(payload) {
            Ok(payload) => payload,
            Err(err) => {
                STREAM_MALFORMED_LINES.click();
                tracing::warn!(error = %err, "dropping protocol line that is not valid UTF-8");
                return None;
            }
        };

        if payload.trim() == LEGACY_DONE {
            return Some(self.emit(ProtocolEvent::Done));
        }

        let value = match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(value) => value,
            Err(err) => {
                STREAM_MALFORMED_LINES.click();
                tracing::warn!(error = %err, line = payload, "dropping malformed protocol line");
                return None;
            }
        };

        match serde_json::from_value::<StreamPayload>(value) {
            Ok(parsed) => parsed.into_event().map(|event| self.emit(event)),
            Err(_) => {
                STREAM_IGNORED_LINES.click();
                tracing::debug!(line = payload, "ignoring protocol line with unknown shape");
                None
            }
        }
    }

    fn emit(&mut self, event: ProtocolEvent) -> ProtocolEvent {
        STREAM_EVENTS.click();
        if event.is_terminal() {
            self.finished = true;
        }
        event
    }
}

impl Decoder for ProtocolCodec {
    type Item = ProtocolEvent;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ProtocolEvent>> {
        while !self.finished {
            let start = self.next_index.min(src.len());
            let Some(offset) = src[start..].iter().position(|b| *b == b'\n') else {
                self.next_index = src.len();
                return Ok(None);
            };
            let newline = start + offset;
            self.next_index = 0;
            let line = src.split_to(newline + 1);
            if let Some(event) = self.interpret(&line[..newline]) {
                return Ok(Some(event));
            }
        }
        self.next_index = 0;
        src.clear();
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<ProtocolEvent>> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // The stream closed in the middle of a line; treat what we have as the last line.
        self.next_index = 0;
        let line = src.split();
        Ok(self.interpret(&line))
    }
}

struct DecodeState<S> {
    bytes: S,
    buffer: BytesMut,
    codec: ProtocolCodec,
    closed: bool,
}

/// Decode a stream of byte chunks into a stream of protocol events.
///
/// The returned stream ends after a `Done` or `Error` event, or when the byte
/// stream ends. A byte stream that ends without either terminal event is not
/// treated as an error here; callers decide what an unterminated response
/// means. A transport error is yielded once and ends the stream.
///
/// ```
/// use bytes::Bytes;
/// use futures::{StreamExt, stream};
/// use palaver::{ProtocolEvent, decode_stream};
///
/// # tokio_test::block_on(async {
/// let chunks = stream::iter(vec![
///     Ok::<_, palaver::Error>(Bytes::from_static(b"data: {\"text\": \"Hel")),
///     Ok(Bytes::from_static(b"lo\"}\ndata: {\"done\": true}\n")),
/// ]);
/// let events: Vec<ProtocolEvent> = decode_stream(chunks).map(|e| e.unwrap()).collect().await;
/// assert_eq!(events, vec![ProtocolEvent::text_delta("Hello"), ProtocolEvent::Done]);
/// # });
/// ```
pub fn decode_stream<S>(byte_stream: S) -> impl Stream<Item = Result<ProtocolEvent>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let state = DecodeState {
        bytes: byte_stream,
        buffer: BytesMut::new(),
        codec: ProtocolCodec::new(),
        closed: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.closed {
                return None;
            }

            // First check if we have a complete line in the buffer
            match state.codec.decode(&mut state.buffer) {
                Ok(Some(event)) => return Some((Ok(event), state)),
                Ok(None) => {}
                Err(err) => {
                    state.closed = true;
                    return Some((Err(err), state));
                }
            }
            if state.codec.is_finished() {
                return None;
            }

            // Read more data
            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    state.buffer.extend_from_slice(&bytes);
                }
                Some(Err(err)) => {
                    STREAM_ERRORS.click();
                    state.closed = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.closed = true;
                    return match state.codec.decode_eof(&mut state.buffer) {
                        Ok(Some(event)) => Some((Ok(event), state)),
                        Ok(None) => None,
                        Err(err) => Some((Err(err), state)),
                    };
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = "data: {\"text\":\"hel\"}\ndata: {\"text\":\"lo\"}\ndata: {\"done\":true}\n";

    fn chunks(pieces: &[&[u8]]) -> impl Stream<Item = Result<Bytes>> + Unpin {
        let owned: Vec<Result<Bytes>> = pieces
            .iter()
            .map(|piece| Ok(Bytes::copy_from_slice(piece)))
            .collect();
        stream::iter(owned)
    }

    async fn collect(pieces: &[&[u8]]) -> Vec<ProtocolEvent> {
        let events = decode_stream(chunks(pieces));
        futures::pin_mut!(events);
        let mut out = Vec::new();
        while let Some(event) = events.next().await {
            out.push(event.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn single_chunk() {
        let events = collect(&[EXAMPLE.as_bytes()]).await;
        assert_eq!(
            events,
            vec![
                ProtocolEvent::text_delta("hel"),
                ProtocolEvent::text_delta("lo"),
                ProtocolEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn every_two_way_split_decodes_identically() {
        let data = "data: {\"text\":\"héllo wörld\"}\n\ndata: {\"text\":\" ✓\"}\ndata: {\"done\":true}\n";
        let bytes = data.as_bytes();
        let expected = collect(&[bytes]).await;
        assert_eq!(expected.len(), 3);
        for i in 0..=bytes.len() {
            let events = collect(&[&bytes[..i], &bytes[i..]]).await;
            assert_eq!(events, expected, "split at {i}");
        }
    }

    #[tokio::test]
    async fn every_three_way_split_decodes_identically() {
        let bytes = EXAMPLE.as_bytes();
        let expected = collect(&[bytes]).await;
        for i in 0..=bytes.len() {
            for j in i..=bytes.len() {
                let events = collect(&[&bytes[..i], &bytes[i..j], &bytes[j..]]).await;
                assert_eq!(events, expected, "split at {i} and {j}");
            }
        }
    }

    #[tokio::test]
    async fn byte_at_a_time() {
        let pieces: Vec<&[u8]> = EXAMPLE.as_bytes().chunks(1).collect();
        let events = collect(&pieces).await;
        assert_eq!(events, collect(&[EXAMPLE.as_bytes()]).await);
    }

    #[tokio::test]
    async fn malformed_line_is_dropped() {
        let data: &[u8] = b"data: {not valid json}\ndata: {\"text\":\"ok\"}\n";
        let events = collect(&[data]).await;
        assert_eq!(events, vec![ProtocolEvent::text_delta("ok")]);
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_dropped() {
        let data: &[u8] = b"data: {\"text\":\"\xff\xfe\"}\ndata: {\"text\":\"ok\"}\n";
        let events = collect(&[data]).await;
        assert_eq!(events, vec![ProtocolEvent::text_delta("ok")]);
    }

    #[tokio::test]
    async fn non_protocol_lines_are_ignored() {
        let data: &[u8] = b"\n: keep-alive\nevent: message\ndata:{\"text\":\"no space\"}\ndata: {}\ndata: {\"done\":false}\ndata: {\"text\":\"kept\"}\n";
        let events = collect(&[data]).await;
        assert_eq!(events, vec![ProtocolEvent::text_delta("kept")]);
    }

    #[tokio::test]
    async fn error_event_is_terminal() {
        let data: &[u8] = b"data: {\"text\":\"partial\"}\ndata: {\"error\":\"model overloaded\"}\ndata: {\"text\":\"never\"}\n";
        let events = collect(&[data]).await;
        assert_eq!(
            events,
            vec![
                ProtocolEvent::text_delta("partial"),
                ProtocolEvent::error("model overloaded"),
            ]
        );
    }

    #[tokio::test]
    async fn done_stops_reading() {
        let pieces: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: {\"done\":true}\ndata: {\"text\":\"late\"}\n")),
            Err(Error::streaming("must not be polled", None)),
        ];
        let events = decode_stream(stream::iter(pieces));
        futures::pin_mut!(events);
        assert_eq!(events.next().await.unwrap().unwrap(), ProtocolEvent::Done);
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn legacy_done_sentinel() {
        let data: &[u8] = b"data: {\"text\":\"hi\"}\n\ndata: [DONE]\n\n";
        let events = collect(&[data]).await;
        assert_eq!(
            events,
            vec![ProtocolEvent::text_delta("hi"), ProtocolEvent::Done]
        );
    }

    #[tokio::test]
    async fn crlf_line_endings() {
        let data: &[u8] = b"data: {\"text\":\"a\"}\r\ndata: {\"done\":true}\r\n";
        let events = collect(&[data]).await;
        assert_eq!(
            events,
            vec![ProtocolEvent::text_delta("a"), ProtocolEvent::Done]
        );
    }

    #[tokio::test]
    async fn final_line_without_newline() {
        let events = collect(&[&b"data: {\"text\":\"a\"}\ndata: {\"te"[..], &b"xt\":\"b\"}"[..]]).await;
        assert_eq!(
            events,
            vec![ProtocolEvent::text_delta("a"), ProtocolEvent::text_delta("b")]
        );
    }

    #[tokio::test]
    async fn unterminated_stream_just_ends() {
        let events = collect(&[&b"data: {\"text\":\"a\"}\n"[..]]).await;
        assert_eq!(events, vec![ProtocolEvent::text_delta("a")]);
        assert!(collect(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let pieces: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: {\"text\":\"a\"}\n")),
            Err(Error::streaming("connection reset", None)),
            Ok(Bytes::from_static(b"data: {\"text\":\"b\"}\n")),
        ];
        let events = decode_stream(stream::iter(pieces));
        futures::pin_mut!(events);
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            ProtocolEvent::text_delta("a")
        );
        assert!(events.next().await.unwrap().unwrap_err().is_streaming());
        assert!(events.next().await.is_none());
    }

    #[test]
    fn codec_holds_partial_lines() {
        let mut codec = ProtocolCodec::new();
        let mut buffer = BytesMut::from(&b"data: {\"text\":"[..]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
        buffer.extend_from_slice(b"\"x\"}\ndata: {\"done\":true}\ndata: {\"text\":\"y\"}\n");
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(ProtocolEvent::text_delta("x"))
        );
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(ProtocolEvent::Done));
        assert!(codec.is_finished());
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn long_line_in_small_chunks_is_scanned_once() {
        let text = "a".repeat(256 * 1024);
        let line = format!("data: {{\"text\":\"{text}\"}}\n");
        let mut codec = ProtocolCodec::new();
        let mut buffer = BytesMut::new();
        let mut decoded = None;
        for piece in line.as_bytes().chunks(64) {
            buffer.extend_from_slice(piece);
            if let Some(event) = codec.decode(&mut buffer).unwrap() {
                decoded = Some(event);
                continue;
            }
            // Each call only looks at bytes it has not seen before.
            assert_eq!(codec.next_index, buffer.len());
        }
        assert_eq!(decoded, Some(ProtocolEvent::text_delta(text)));
        assert!(buffer.is_empty());
        assert_eq!(codec.next_index, 0);
    }
}
