//! Stream Accumulator
//!
//! Rebuilds an assistant reply from the chunked reply endpoint. Each complete
//! line of the body that starts with [`DATA_PREFIX`] carries one JSON chunk
//! envelope:
//!
//! ```text
//! data: {"type": "content", "content": "The statute"}
//! data: {"type": "analysis", "analysis": {"risk": "low"}}
//! data: {"type": "complete"}
//! ```
//!
//! Lines without the prefix are ignored, malformed chunks are logged and
//! skipped, and nothing after `complete` is read.

use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use super::decoder::LineDecoder;
use crate::messages::MessageId;

/// Marker that precedes every chunk envelope
pub const DATA_PREFIX: &str = "data: ";

/// In-progress indicator appended to a reply while it is still streaming
pub const CURSOR: char = '▊';

/// One decoded chunk envelope
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChunkEnvelope {
    Content {
        #[serde(alias = "delta")]
        content: String,
    },
    Analysis {
        #[serde(alias = "data")]
        analysis: Value,
    },
    Complete,
    #[serde(other)]
    Unknown,
}

/// Why a reply stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishReason {
    /// The server sent a `complete` chunk
    Completed,
    /// The body ended (or failed) before `complete`
    StreamClosed,
}

/// Progress of one streamed reply
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// A content chunk was appended
    Delta {
        /// Reply being built
        message_id: MessageId,
        /// The chunk as received
        delta: String,
        /// Full text so far
        accumulated: String,
    },
    /// Side-channel analysis, forwarded as received
    Analysis {
        /// Reply in progress when it arrived, if any
        message_id: Option<MessageId>,
        /// Opaque analysis payload
        payload: Value,
    },
    /// The reply is final; always the last event of a stream
    Finished {
        /// Reply that finished
        message_id: MessageId,
        /// Final text with any trailing cursor removed
        content: String,
        /// How it ended
        reason: FinishReason,
    },
}

/// State of one in-flight reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSession {
    message_id: MessageId,
    accumulated: String,
    complete: bool,
}

impl StreamSession {
    fn new() -> Self {
        Self {
            message_id: MessageId::new(),
            accumulated: String::new(),
            complete: false,
        }
    }

    /// Reply identifier
    #[must_use]
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Concatenation of every content chunk so far
    #[must_use]
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated
    }

    /// Whether a `complete` chunk has been seen
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Text for display: the accumulated text, plus [`CURSOR`] while streaming
    #[must_use]
    pub fn display_text(&self) -> String {
        if self.complete {
            self.accumulated.clone()
        } else {
            format!("{}{CURSOR}", self.accumulated)
        }
    }

    fn finalize(&mut self, complete: bool) {
        while self.accumulated.ends_with(CURSOR) {
            self.accumulated.pop();
        }
        self.complete = complete;
    }
}

/// Push-driven reply reconstruction
///
/// Feed raw body bytes with [`push`](Self::push) in whatever chunks they
/// arrive, then call [`finish`](Self::finish) at end of body.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    decoder: LineDecoder,
    session: Option<StreamSession>,
    finished: bool,
    skipped: u64,
}

impl StreamAccumulator {
    /// Create an accumulator with no reply started
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The reply in progress, created by the first content chunk
    #[must_use]
    pub fn session(&self) -> Option<&StreamSession> {
        self.session.as_ref()
    }

    /// Whether a terminal event has been produced
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Marked lines that could not be decoded
    #[must_use]
    pub fn skipped_lines(&self) -> u64 {
        self.skipped
    }

    /// Feed body bytes; returns the events produced by every line they complete
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        self.decoder.push(bytes);
        let mut events = Vec::new();
        while !self.finished {
            let Some(line) = self.decoder.next_line() else {
                break;
            };
            self.handle_line(&line, &mut events);
        }
        events
    }

    /// Signal end of body
    ///
    /// Parses any unterminated last line, then finalizes the reply with
    /// [`FinishReason::StreamClosed`] if `complete` never arrived. Returns
    /// nothing when the reply already finished.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        if let Some(line) = self.decoder.take_remainder() {
            self.handle_line(&line, &mut events);
        }
        if !self.finished {
            events.push(self.finalize(FinishReason::StreamClosed));
        }
        events
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        let Some(body) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };

        let envelope = match serde_json::from_str::<ChunkEnvelope>(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.skipped += 1;
                tracing::warn!(error = %e, len = body.len(), "Skipping malformed stream chunk");
                return;
            }
        };

        match envelope {
            ChunkEnvelope::Content { content } => {
                let session = self.session.get_or_insert_with(StreamSession::new);
                session.accumulated.push_str(&content);
                events.push(StreamEvent::Delta {
                    message_id: session.message_id.clone(),
                    delta: content,
                    accumulated: session.accumulated.clone(),
                });
            }
            ChunkEnvelope::Analysis { analysis } => events.push(StreamEvent::Analysis {
                message_id: self.session.as_ref().map(|s| s.message_id.clone()),
                payload: analysis,
            }),
            ChunkEnvelope::Complete => events.push(self.finalize(FinishReason::Completed)),
            ChunkEnvelope::Unknown => {
                tracing::debug!(len = body.len(), "Ignoring unknown stream chunk type");
            }
        }
    }

    fn finalize(&mut self, reason: FinishReason) -> StreamEvent {
        self.finished = true;
        let session = self.session.get_or_insert_with(StreamSession::new);
        session.finalize(reason == FinishReason::Completed);

        tracing::debug!(
            message_id = %session.message_id,
            chars = session.accumulated.chars().count(),
            ?reason,
            "Stream finished"
        );

        StreamEvent::Finished {
            message_id: session.message_id.clone(),
            content: session.accumulated.clone(),
            reason,
        }
    }
}

/// Turn a response body into a lazy sequence of [`StreamEvent`]s
///
/// The sequence ends after the terminal [`StreamEvent::Finished`], which is
/// always produced exactly once. A read error ends the body like a close.
pub fn consume<S, B, E>(body: S) -> impl Stream<Item = StreamEvent>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let mut accumulator = StreamAccumulator::new();
        futures::pin_mut!(body);

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in accumulator.push(bytes.as_ref()) {
                        yield event;
                    }
                    if accumulator.is_finished() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stream read failed, treating as close");
                    break;
                }
            }
        }

        for event in accumulator.finish() {
            yield event;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn deltas(events: &[StreamEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Delta { delta, .. } => Some(delta.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_content_accumulates_in_order() {
        let mut acc = StreamAccumulator::new();
        let events = acc.push(
            b"data: {\"type\":\"content\",\"content\":\"Under \"}\n\
              data: {\"type\":\"content\",\"content\":\"tort law\"}\n",
        );

        assert_eq!(deltas(&events), vec!["Under ", "tort law"]);
        let session = acc.session().unwrap();
        assert_eq!(session.accumulated_text(), "Under tort law");
        assert!(!session.is_complete());
        assert_eq!(session.display_text(), "Under tort law▊");
    }

    #[test]
    fn test_complete_strips_cursor_and_stops_reading() {
        let mut acc = StreamAccumulator::new();
        let events = acc.push(
            "data: {\"type\":\"content\",\"content\":\"Done▊\"}\n\
             data: {\"type\":\"complete\"}\n\
             data: {\"type\":\"content\",\"content\":\"late\"}\n"
                .as_bytes(),
        );

        match events.last().unwrap() {
            StreamEvent::Finished { content, reason, .. } => {
                assert_eq!(content, "Done");
                assert_eq!(*reason, FinishReason::Completed);
            }
            other => panic!("expected finish, got {other:?}"),
        }
        assert_eq!(events.len(), 2);
        assert!(acc.session().unwrap().is_complete());
        assert!(acc.push(b"data: {\"type\":\"complete\"}\n").is_empty());
        assert!(acc.finish().is_empty());
    }

    #[test]
    fn test_malformed_and_unmarked_lines_are_skipped() {
        let mut acc = StreamAccumulator::new();
        let events = acc.push(
            b"data: {\"type\":\"content\",\"content\":\"a\"}\n\
              data: {not json\n\
              : keep-alive comment\n\
              event: message\n\
              \n\
              data: {\"type\":\"content\",\"content\":\"b\"}\n",
        );

        assert_eq!(deltas(&events), vec!["a", "b"]);
        assert_eq!(acc.skipped_lines(), 1);
        assert_eq!(acc.session().unwrap().accumulated_text(), "ab");
    }

    #[test]
    fn test_analysis_is_forwarded_not_accumulated() {
        let mut acc = StreamAccumulator::new();
        let events = acc.push(
            b"data: {\"type\":\"analysis\",\"analysis\":{\"risk\":\"low\"}}\n\
              data: {\"type\":\"content\",\"content\":\"x\"}\n",
        );

        assert_eq!(
            events[0],
            StreamEvent::Analysis {
                message_id: None,
                payload: serde_json::json!({"risk": "low"}),
            }
        );
        assert_eq!(acc.session().unwrap().accumulated_text(), "x");
    }

    #[test]
    fn test_close_without_complete() {
        let mut acc = StreamAccumulator::new();
        acc.push(b"data: {\"type\":\"content\",\"content\":\"partial\"}\n");
        let events = acc.finish();

        match &events[..] {
            [StreamEvent::Finished { content, reason, .. }] => {
                assert_eq!(content, "partial");
                assert_eq!(*reason, FinishReason::StreamClosed);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!acc.session().unwrap().is_complete());
    }

    #[test]
    fn test_unterminated_last_line_is_parsed_at_finish() {
        let mut acc = StreamAccumulator::new();
        assert!(acc.push(b"data: {\"type\":\"complete\"}").is_empty());

        let events = acc.finish();
        assert!(matches!(
            events[..],
            [StreamEvent::Finished {
                reason: FinishReason::Completed,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_consume_ends_after_read_error() {
        let chunks: Vec<Result<&[u8], String>> = vec![
            Ok(b"data: {\"type\":\"content\",\"content\":\"hel".as_slice()),
            Ok(b"lo\"}\n".as_slice()),
            Err("connection reset".to_string()),
            Ok(b"data: {\"type\":\"content\",\"content\":\"never\"}\n".as_slice()),
        ];

        let events: Vec<StreamEvent> = consume(futures::stream::iter(chunks)).collect().await;

        assert_eq!(deltas(&events), vec!["hello"]);
        assert!(matches!(
            events.last(),
            Some(StreamEvent::Finished {
                reason: FinishReason::StreamClosed,
                ..
            })
        ));
    }
}
