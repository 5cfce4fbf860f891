//! Incremental decoder for the upstream event stream.
//!
//! The upstream body arrives as arbitrary byte chunks. Lines may be split
//! anywhere, including inside a multi-byte UTF-8 sequence, so bytes are
//! buffered until a newline and only complete lines are decoded.
//!
//! Each line is then classified:
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}   -> Delta("Hel")
//! data: [DONE]                                      -> Done
//! : keep-alive                                      -> Ignored
//! data: {malformed                                  -> Malformed(..)
//! ```

use tracing::{debug, warn};

use crate::relay::types::{CompletionChunk, UpstreamEvent};

/// Prefix of every payload line.
pub const DATA_PREFIX: &str = "data: ";

/// End-of-stream sentinel payload.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Line-buffering decoder for one upstream response.
#[derive(Debug, Default)]
pub struct EventDecoder {
    /// Bytes of the current, not yet terminated line.
    pending: Vec<u8>,

    /// Set once the sentinel has been seen; all further input is dropped.
    done: bool,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been decoded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one chunk and return the events of every line it completes.
    ///
    /// Ignored lines are not returned. If the sentinel is reached, it is the
    /// last event returned and the rest of the chunk is discarded.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<UpstreamEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }

        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let event = decode_line(&self.pending[start..end]);
            start = end + 1;

            match event {
                UpstreamEvent::Ignored => {}
                UpstreamEvent::Done => {
                    events.push(UpstreamEvent::Done);
                    self.done = true;
                    self.pending.clear();
                    return events;
                }
                other => events.push(other),
            }
        }

        self.pending.drain(..start);
        events
    }

    /// Flush an unterminated final line at end of input.
    pub fn finish(&mut self) -> Vec<UpstreamEvent> {
        if self.done || self.pending.is_empty() {
            return Vec::new();
        }

        let line = std::mem::take(&mut self.pending);
        match decode_line(&line) {
            UpstreamEvent::Ignored => Vec::new(),
            UpstreamEvent::Done => {
                self.done = true;
                vec![UpstreamEvent::Done]
            }
            other => vec![other],
        }
    }
}

/// Decode the raw bytes of one line (without its `\n`).
fn decode_line(raw: &[u8]) -> UpstreamEvent {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    match std::str::from_utf8(raw) {
        Ok(line) => classify_line(line),
        Err(e) => UpstreamEvent::Malformed(format!("invalid UTF-8 in event line: {e}")),
    }
}

/// Classify a single decoded line.
pub fn classify_line(line: &str) -> UpstreamEvent {
    if line.trim().is_empty() {
        return UpstreamEvent::Ignored;
    }

    // Comments, keep-alives, `event:` and `id:` lines.
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return UpstreamEvent::Ignored;
    };

    if payload.trim_end() == DONE_SENTINEL {
        return UpstreamEvent::Done;
    }

    let chunk: CompletionChunk = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!(payload, "Unparseable upstream event");
            return UpstreamEvent::Malformed(e.to_string());
        }
    };

    if let Some(error) = chunk.error {
        warn!(
            message = error.message.as_deref().unwrap_or("unknown streaming error"),
            "Upstream reported an in-band error"
        );
        return UpstreamEvent::Ignored;
    }

    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty())
        .map_or(UpstreamEvent::Ignored, UpstreamEvent::Delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_STREAM: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    fn collect_text(events: &[UpstreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                UpstreamEvent::Delta(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_classify_delta() {
        assert_eq!(
            classify_line(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#),
            UpstreamEvent::Delta("Hi".into())
        );
    }

    #[test]
    fn test_classify_non_payload_lines() {
        assert_eq!(classify_line(""), UpstreamEvent::Ignored);
        assert_eq!(classify_line("   \t"), UpstreamEvent::Ignored);
        assert_eq!(classify_line(": keep-alive"), UpstreamEvent::Ignored);
        assert_eq!(classify_line("event: message"), UpstreamEvent::Ignored);
        assert_eq!(classify_line("data:[DONE]"), UpstreamEvent::Ignored);
    }

    #[test]
    fn test_classify_empty_or_missing_delta() {
        assert_eq!(
            classify_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            UpstreamEvent::Ignored
        );
        assert_eq!(
            classify_line(r#"data: {"choices":[{"delta":{"content":""}}]}"#),
            UpstreamEvent::Ignored
        );
        assert_eq!(
            classify_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
            UpstreamEvent::Ignored
        );
        assert_eq!(classify_line(r#"data: {"choices":[]}"#), UpstreamEvent::Ignored);
    }

    #[test]
    fn test_classify_in_band_error() {
        assert_eq!(
            classify_line(r#"data: {"error":{"message":"overloaded"}}"#),
            UpstreamEvent::Ignored
        );
    }

    #[test]
    fn test_classify_malformed() {
        assert!(matches!(
            classify_line("data: {malformed json"),
            UpstreamEvent::Malformed(_)
        ));
        assert!(matches!(classify_line("data: 42"), UpstreamEvent::Malformed(_)));
    }

    #[test]
    fn test_single_chunk() {
        let mut decoder = EventDecoder::new();
        let events = decoder.push(HELLO_STREAM.as_bytes());
        assert_eq!(collect_text(&events), "Hello");
        assert_eq!(events.last(), Some(&UpstreamEvent::Done));
        assert!(decoder.is_done());
    }

    #[test]
    fn test_independent_of_chunk_boundaries() {
        let bytes = HELLO_STREAM.as_bytes();
        for size in 1..=bytes.len() {
            let mut decoder = EventDecoder::new();
            let mut events = Vec::new();
            for chunk in bytes.chunks(size) {
                events.extend(decoder.push(chunk));
            }
            events.extend(decoder.finish());

            assert_eq!(collect_text(&events), "Hello", "chunk size {size}");
            assert_eq!(events.last(), Some(&UpstreamEvent::Done), "chunk size {size}");
        }
    }

    #[test]
    fn test_split_multibyte_character() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"h\u{e9}\u{1f600}\"}}]}\n";
        let bytes = line.as_bytes();
        let mut decoder = EventDecoder::new();
        let mut events = Vec::new();
        // Split one byte into the four-byte emoji.
        let cut = line.find('\u{1f600}').unwrap() + 1;
        events.extend(decoder.push(&bytes[..cut]));
        events.extend(decoder.push(&bytes[cut..]));

        assert_eq!(events, vec![UpstreamEvent::Delta("h\u{e9}\u{1f600}".into())]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = EventDecoder::new();
        let events = decoder.push(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\r\n\r\ndata: [DONE]\r\n",
        );
        assert_eq!(
            events,
            vec![UpstreamEvent::Delta("a".into()), UpstreamEvent::Done]
        );
    }

    #[test]
    fn test_malformed_line_does_not_stop_decoding() {
        let mut decoder = EventDecoder::new();
        let events = decoder.push(
            b"data: {malformed json\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
        );
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], UpstreamEvent::Malformed(_)));
        assert_eq!(events[1], UpstreamEvent::Delta("ok".into()));
    }

    #[test]
    fn test_input_after_done_is_dropped() {
        let mut decoder = EventDecoder::new();
        let events = decoder.push(
            b"data: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        );
        assert_eq!(events, vec![UpstreamEvent::Done]);
        assert!(decoder
            .push(b"data: {\"choices\":[{\"delta\":{\"content\":\"later\"}}]}\n")
            .is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = EventDecoder::new();
        assert!(decoder
            .push(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}")
            .is_empty());
        assert_eq!(decoder.finish(), vec![UpstreamEvent::Delta("tail".into())]);
        assert!(!decoder.is_done());
    }
}
