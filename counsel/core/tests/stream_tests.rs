//! Stream Accumulator Properties
//!
//! Chunk boundaries, malformed input and termination, checked against the
//! public accumulator and `consume` APIs.

use futures::StreamExt;
use pretty_assertions::assert_eq;
use tokio_test::{assert_pending, assert_ready};

use counsel_core::streaming::{consume, FinishReason, StreamAccumulator, StreamEvent, CURSOR};

// =============================================================================
// Helpers
// =============================================================================

fn content(text: &str) -> String {
    format!(
        "data: {}\n",
        serde_json::json!({ "type": "content", "content": text })
    )
}

const COMPLETE: &str = "data: {\"type\":\"complete\"}\n";

/// Final text and reason, from whichever event finished the reply
fn finished(events: &[StreamEvent]) -> Option<(String, FinishReason)> {
    events.iter().find_map(|e| match e {
        StreamEvent::Finished {
            content, reason, ..
        } => Some((content.clone(), *reason)),
        _ => None,
    })
}

fn deltas(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Delta { delta, .. } => Some(delta.clone()),
            _ => None,
        })
        .collect()
}

/// Feed `parts` in order, then end the body
fn run(parts: &[&[u8]]) -> (Vec<StreamEvent>, StreamAccumulator) {
    let mut accumulator = StreamAccumulator::new();
    let mut events = Vec::new();
    for part in parts {
        events.extend(accumulator.push(part));
    }
    events.extend(accumulator.finish());
    (events, accumulator)
}

// =============================================================================
// Chunk Boundaries
// =============================================================================

#[test]
fn test_every_two_way_split_reassembles_the_same_reply() {
    let body = format!(
        "{}{}{}{COMPLETE}",
        content("The duty of care "),
        content("was breached — "),
        content("see § 12.")
    );
    let bytes = body.as_bytes();
    let expected = "The duty of care was breached — see § 12.".to_string();

    for split in 0..=bytes.len() {
        let (events, accumulator) = run(&[&bytes[..split], &bytes[split..]]);

        assert_eq!(
            finished(&events),
            Some((expected.clone(), FinishReason::Completed)),
            "split at byte {split}"
        );
        assert_eq!(deltas(&events).concat(), expected, "split at byte {split}");
        assert!(accumulator.session().unwrap().is_complete());
    }
}

#[test]
fn test_byte_at_a_time_matches_single_push() {
    let body = format!("{}{}{COMPLETE}", content("naïve "), content("plaintiff"));
    let bytes = body.as_bytes();

    let parts: Vec<&[u8]> = bytes.chunks(1).collect();
    let (byte_events, _) = run(&parts);
    let (whole_events, _) = run(&[bytes]);

    assert_eq!(deltas(&byte_events), deltas(&whole_events));
    assert_eq!(finished(&byte_events), finished(&whole_events));
}

#[test]
fn test_crlf_line_endings_are_accepted() {
    let body = "data: {\"type\":\"content\",\"content\":\"a\"}\r\ndata: {\"type\":\"complete\"}\r\n";
    let (events, _) = run(&[body.as_bytes()]);
    assert_eq!(finished(&events), Some(("a".into(), FinishReason::Completed)));
}

// =============================================================================
// Malformed Input
// =============================================================================

#[test]
fn test_malformed_lines_leave_accumulated_text_unchanged() {
    let body = [
        content("Negligence "),
        "data: {not json\n".to_string(),
        "data: [1, 2\n".to_string(),
        "data: {\"type\":\"content\"}\n".to_string(),
        "event: ping\n".to_string(),
        "\n".to_string(),
        ": keep-alive comment\n".to_string(),
        "data: {\"type\":\"progress\",\"value\":3}\n".to_string(),
        content("requires damages."),
        COMPLETE.to_string(),
    ]
    .concat();

    let (events, accumulator) = run(&[body.as_bytes()]);

    assert_eq!(
        deltas(&events),
        vec!["Negligence ".to_string(), "requires damages.".to_string()]
    );
    assert_eq!(
        finished(&events),
        Some(("Negligence requires damages.".into(), FinishReason::Completed))
    );
    assert_eq!(accumulator.skipped_lines(), 3);
}

#[test]
fn test_only_malformed_input_still_terminates() {
    let (events, accumulator) = run(&[b"data: {{{\ndata: nope\n".as_slice()]);

    assert_eq!(events.len(), 1);
    assert_eq!(finished(&events), Some((String::new(), FinishReason::StreamClosed)));
    assert!(!accumulator.session().unwrap().is_complete());
}

// =============================================================================
// Termination
// =============================================================================

#[test]
fn test_complete_finishes_exactly_once() {
    for n in 0..5 {
        let mut body: String = (0..n).map(|i| content(&i.to_string())).collect();
        body.push_str(COMPLETE);
        body.push_str(&content("after"));
        body.push_str(COMPLETE);

        let (events, accumulator) = run(&[body.as_bytes()]);
        let terminal: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Finished { .. }))
            .collect();

        assert_eq!(terminal.len(), 1, "{n} content chunks");
        assert!(matches!(events.last(), Some(StreamEvent::Finished { .. })));
        assert!(!deltas(&events).contains(&"after".to_string()));
        assert!(accumulator.session().unwrap().is_complete());
    }
}

#[test]
fn test_close_without_complete_reports_stream_closed() {
    let body = format!("{}data: {{\"type\":\"content\",\"content\":\"cut of\"}}", content("Half a "));
    let (events, accumulator) = run(&[body.as_bytes()]);

    assert_eq!(
        finished(&events),
        Some(("Half a cut of".into(), FinishReason::StreamClosed))
    );
    let session = accumulator.session().unwrap();
    assert!(!session.is_complete());
    assert!(!session.display_text().is_empty());
}

#[test]
fn test_cursor_is_shown_while_streaming_and_stripped_on_completion() {
    let mut accumulator = StreamAccumulator::new();
    accumulator.push(content(&format!("Drafting{CURSOR}")).as_bytes());

    let session = accumulator.session().unwrap();
    assert_eq!(session.display_text(), format!("Drafting{CURSOR}{CURSOR}"));

    let events = accumulator.push(COMPLETE.as_bytes());
    assert_eq!(finished(&events), Some(("Drafting".into(), FinishReason::Completed)));
    assert_eq!(accumulator.session().unwrap().display_text(), "Drafting");
}

#[test]
fn test_analysis_is_forwarded_not_accumulated() {
    let body = format!(
        "{}data: {{\"type\":\"analysis\",\"analysis\":{{\"risk\":\"high\"}}}}\n{}{COMPLETE}",
        content("A"),
        content("B")
    );
    let (events, _) = run(&[body.as_bytes()]);

    let analysis: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Analysis { payload, message_id } => Some((payload.clone(), message_id.is_some())),
            _ => None,
        })
        .collect();
    assert_eq!(analysis, vec![(serde_json::json!({"risk": "high"}), true)]);
    assert_eq!(finished(&events), Some(("AB".into(), FinishReason::Completed)));
}

// =============================================================================
// consume()
// =============================================================================

#[tokio::test]
async fn test_consume_ends_after_complete_without_draining_body() {
    let chunks: Vec<Result<Vec<u8>, String>> = vec![
        Ok(content("Hello").into_bytes()),
        Ok(COMPLETE.as_bytes().to_vec()),
        Ok(content("ignored").into_bytes()),
    ];

    let events: Vec<_> = consume(futures::stream::iter(chunks)).collect().await;

    assert_eq!(events.len(), 2);
    assert_eq!(finished(&events), Some(("Hello".into(), FinishReason::Completed)));
}

#[tokio::test]
async fn test_consume_treats_read_error_as_close() {
    let chunks: Vec<Result<Vec<u8>, String>> = vec![
        Ok(content("Partial").into_bytes()),
        Err("connection reset".to_string()),
        Ok(content("never read").into_bytes()),
    ];

    let events: Vec<_> = consume(futures::stream::iter(chunks)).collect().await;

    assert_eq!(deltas(&events), vec!["Partial".to_string()]);
    assert_eq!(finished(&events), Some(("Partial".into(), FinishReason::StreamClosed)));
}

#[test]
fn test_consume_is_lazy_until_a_line_completes() {
    let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Vec<u8>, String>>();
    let mut events = tokio_test::task::spawn(consume(rx));

    assert_pending!(events.poll_next());

    tx.unbounded_send(Ok(b"data: {\"type\":\"content\",".to_vec()))
        .unwrap();
    assert_pending!(events.poll_next());

    tx.unbounded_send(Ok(b"\"content\":\"Hi\"}\n".to_vec())).unwrap();
    match assert_ready!(events.poll_next()) {
        Some(StreamEvent::Delta { accumulated, .. }) => assert_eq!(accumulated, "Hi"),
        other => panic!("expected delta, got {other:?}"),
    }

    drop(tx);
    match assert_ready!(events.poll_next()) {
        Some(StreamEvent::Finished { reason, .. }) => assert_eq!(reason, FinishReason::StreamClosed),
        other => panic!("expected finish, got {other:?}"),
    }
    assert_eq!(assert_ready!(events.poll_next()), None);
}
