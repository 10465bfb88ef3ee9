use serde_json::Value;
use tracing::{debug, warn};

use crate::events::{ChatAnswer, ServiceError, StreamFrame};

/// Literal marker that starts every frame on the wire.
pub const FRAME_PREFIX: &str = "data:";
/// Frame body that marks the end of the stream.
pub const TERMINAL_SENTINEL: &str = "[DONE]";

/// Incremental decoder for the completion stream.
///
/// Newlines carry no meaning at this layer and are dropped as bytes arrive.
/// A frame is complete once the next `data:` marker (or the end of the
/// stream) is seen, so chunk boundaries may fall anywhere, including inside
/// a marker or a multi-byte UTF-8 sequence.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    buffer: String,
    answer: String,
    error: Option<ServiceError>,
    finished: bool,
    skipped: usize,
}

impl FrameDecoder {
    /// Feed arbitrary bytes and return content fragments completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut fragments = Vec::new();
        if self.finished {
            return fragments;
        }

        self.pending.extend_from_slice(bytes);
        let text = take_utf8_prefix(&mut self.pending);
        self.buffer.extend(text.chars().filter(|c| *c != '\n'));

        while let Some(split) = self.buffer.find(FRAME_PREFIX) {
            let body = self.buffer[..split].to_string();
            self.buffer.drain(..split + FRAME_PREFIX.len());
            self.process(&body, &mut fragments);
            if self.finished {
                self.buffer.clear();
                break;
            }
        }

        fragments
    }

    /// Signal end of stream and return fragments from the trailing frame.
    pub fn flush(&mut self) -> Vec<String> {
        let mut fragments = Vec::new();
        if !self.finished {
            if !self.pending.is_empty() {
                let tail = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                self.buffer.extend(tail.chars().filter(|c| *c != '\n'));
            }
            let body = std::mem::take(&mut self.buffer);
            self.process(&body, &mut fragments);
            self.finished = true;
        }

        if self.skipped > 0 {
            warn!(skipped = self.skipped, "skipped malformed stream frames");
        }
        fragments
    }

    /// True once the sentinel or an error frame was seen, or after `flush`.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn skipped_frames(&self) -> usize {
        self.skipped
    }

    /// Accumulated answer, or the service error that replaced it.
    pub fn into_answer(self) -> ChatAnswer {
        match self.error {
            Some(error) => ChatAnswer::ServiceError(error),
            None => ChatAnswer::Reply(self.answer),
        }
    }

    fn process(&mut self, body: &str, fragments: &mut Vec<String>) {
        let body = body.trim();
        if body.is_empty() {
            return;
        }

        match classify_frame(body) {
            StreamFrame::Content(text) => {
                self.answer.push_str(&text);
                fragments.push(text);
            }
            StreamFrame::Empty => {}
            StreamFrame::Malformed => {
                self.skipped += 1;
                debug!(len = body.len(), "skipping malformed stream frame");
            }
            StreamFrame::Terminal => {
                self.finished = true;
            }
            StreamFrame::Error(error) => {
                debug!("stream carried a service error frame");
                self.error = Some(error);
                self.finished = true;
            }
        }
    }
}

/// Classify a single trimmed frame body.
pub fn classify_frame(body: &str) -> StreamFrame {
    if body == TERMINAL_SENTINEL {
        return StreamFrame::Terminal;
    }

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return StreamFrame::Malformed;
    };

    let delta = value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .filter(|delta| !delta.is_null());

    match delta {
        Some(delta) => match delta.get("content").and_then(Value::as_str) {
            Some(content) if !content.is_empty() => StreamFrame::Content(content.to_owned()),
            _ => StreamFrame::Empty,
        },
        None => match value.get("error").filter(|error| is_truthy(error)) {
            Some(error) => StreamFrame::Error(service_error(error)),
            None => StreamFrame::Empty,
        },
    }
}

/// Decode a complete response body in one shot.
pub fn decode_body(body: &str) -> ChatAnswer {
    decode_chunks([body.as_bytes()])
}

/// Decode a sequence of raw chunks in arrival order.
pub fn decode_chunks<I, B>(chunks: I) -> ChatAnswer
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut decoder = FrameDecoder::default();
    for chunk in chunks {
        decoder.feed(chunk.as_ref());
        if decoder.is_finished() {
            break;
        }
    }
    decoder.flush();
    decoder.into_answer()
}

fn service_error(error: &Value) -> ServiceError {
    if let Some(message) = error.as_str() {
        return ServiceError {
            message: Some(message.to_owned()),
            details: None,
        };
    }

    ServiceError {
        message: error.get("message").and_then(field_text),
        details: error.get("details").and_then(field_text),
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Decode the longest valid UTF-8 prefix, keeping an incomplete trailing
/// sequence in `pending` for the next chunk. Invalid bytes become U+FFFD.
fn take_utf8_prefix(pending: &mut Vec<u8>) -> String {
    let mut out = String::new();
    loop {
        match std::str::from_utf8(pending) {
            Ok(text) => {
                out.push_str(text);
                pending.clear();
                return out;
            }
            Err(error) => {
                let valid = error.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&pending[..valid]));
                match error.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid + len);
                    }
                    None => {
                        pending.drain(..valid);
                        return out;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_frame(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices":[{"index":0,"delta":{"content":text}}]})
        )
    }

    #[test]
    fn feed_emits_fragment_once_next_marker_arrives() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.feed(content_frame("Hel").as_bytes()).is_empty());

        let fragments = decoder.feed(content_frame("lo").as_bytes());
        assert_eq!(fragments, vec!["Hel".to_string()]);

        let fragments = decoder.feed(b"data: [DONE]\n\n");
        assert_eq!(fragments, vec!["lo".to_string()]);
        assert!(!decoder.is_finished());

        assert!(decoder.flush().is_empty());
        assert_eq!(decoder.into_answer(), ChatAnswer::Reply("Hello".into()));
    }

    #[test]
    fn marker_split_across_chunks_is_reassembled() {
        let mut decoder = FrameDecoder::default();
        decoder.feed(content_frame("a").as_bytes());
        decoder.feed(b"da");
        decoder.feed(b"ta: [DONE]");
        decoder.flush();
        assert_eq!(decoder.into_answer(), ChatAnswer::Reply("a".into()));
    }

    #[test]
    fn multibyte_character_split_across_chunks_survives() {
        let frame = content_frame("h\u{e9}llo");
        let bytes = frame.as_bytes();
        let split = frame.find('\u{e9}').expect("accented char") + 1;

        let answer = decode_chunks([&bytes[..split], &bytes[split..]]);
        assert_eq!(answer, ChatAnswer::Reply("h\u{e9}llo".into()));
    }

    #[test]
    fn classify_frame_reports_each_variant() {
        assert_eq!(classify_frame("[DONE]"), StreamFrame::Terminal);
        assert_eq!(classify_frame("{oops"), StreamFrame::Malformed);
        assert_eq!(
            classify_frame(r#"{"choices":[{"delta":{"content":"x"}}]}"#),
            StreamFrame::Content("x".into())
        );
        assert_eq!(
            classify_frame(r#"{"choices":[{"delta":{"content":null,"role":"assistant"}}]}"#),
            StreamFrame::Empty
        );
        assert_eq!(classify_frame(r#"{"choices":[]}"#), StreamFrame::Empty);
        assert_eq!(
            classify_frame(r#"{"error":{"message":"m","details":"d"}}"#),
            StreamFrame::Error(ServiceError {
                message: Some("m".into()),
                details: Some("d".into()),
            })
        );
    }

    #[test]
    fn content_wins_over_error_when_delta_is_present() {
        let frame = r#"{"choices":[{"delta":{"content":"ok"}}],"error":{"message":"ignored"}}"#;
        assert_eq!(classify_frame(frame), StreamFrame::Content("ok".into()));
    }

    #[test]
    fn take_utf8_prefix_replaces_invalid_bytes() {
        let mut pending = vec![b'a', 0xff, b'b'];
        assert_eq!(take_utf8_prefix(&mut pending), "a\u{fffd}b");
        assert!(pending.is_empty());
    }
}
