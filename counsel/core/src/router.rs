//! Message Router
//!
//! Turns raw text frames into log entries. Every frame either becomes a typed
//! [`LogEntry::Event`], an [`LogEntry::Unrecognized`] raw entry, or is
//! rejected as a [`ParseError`]; rejection is logged and never propagated, so
//! a bad frame cannot take a channel down.
//!
//! Dispatch does not deduplicate: the same frame dispatched twice is logged
//! twice.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::events::InboundEvent;
use crate::store::{ConversationStore, LogEntry};

/// What happened to a dispatched frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Appended as a typed event
    Routed {
        /// Log sequence number
        seq: u64,
        /// Event discriminant
        tag: &'static str,
    },
    /// Appended to the raw log only
    Unrecognized {
        /// Log sequence number
        seq: u64,
        /// The discriminant, when present
        tag: Option<String>,
    },
    /// Discarded as unparseable
    Rejected,
}

/// A frame after classification, before it is appended
#[derive(Clone, Debug, PartialEq)]
pub enum Classified {
    /// A known, valid event
    Event(InboundEvent),
    /// A JSON object with a missing or unknown discriminant
    Unrecognized {
        /// The discriminant, when present
        tag: Option<String>,
        /// The payload as received
        payload: Value,
    },
}

/// Dispatch counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Frames handed to [`MessageRouter::dispatch`]
    pub dispatched: u64,
    /// Frames appended as typed events
    pub routed: u64,
    /// Frames appended raw
    pub unrecognized: u64,
    /// Frames discarded
    pub rejected: u64,
}

/// Classifies frames and appends them to a store
#[derive(Debug, Default)]
pub struct MessageRouter {
    stats: RouterStats,
}

impl MessageRouter {
    /// Create a router with zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Classify a raw frame
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the frame is not a JSON object, or when a
    /// known discriminant carries fields of the wrong shape or value.
    pub fn classify(raw: &str) -> Result<Classified, ParseError> {
        let payload: Value = serde_json::from_str(raw)?;
        if !payload.is_object() {
            return Err(ParseError::NotAnObject);
        }

        let Some(tag) = payload.get("type").and_then(Value::as_str).map(str::to_owned) else {
            return Ok(Classified::Unrecognized { tag: None, payload });
        };

        match InboundEvent::deserialize(&payload)? {
            InboundEvent::Unknown => Ok(Classified::Unrecognized {
                tag: Some(tag),
                payload,
            }),
            event => Ok(Classified::Event(event.normalize()?)),
        }
    }

    /// Parse, classify and append one frame
    pub fn dispatch(&mut self, raw: &str, store: &mut ConversationStore) -> DispatchOutcome {
        self.stats.dispatched += 1;

        match Self::classify(raw) {
            Ok(Classified::Event(event)) => {
                let tag = event.tag();
                let seq = store.append(LogEntry::Event(event));
                self.stats.routed += 1;
                tracing::debug!(seq, tag, "Routed inbound event");
                DispatchOutcome::Routed { seq, tag }
            }
            Ok(Classified::Unrecognized { tag, payload }) => {
                let seq = store.append(LogEntry::Unrecognized {
                    tag: tag.clone(),
                    payload,
                });
                self.stats.unrecognized += 1;
                tracing::debug!(seq, tag = ?tag, "Unrecognized inbound message kept raw");
                DispatchOutcome::Unrecognized { seq, tag }
            }
            Err(e) => {
                self.stats.rejected += 1;
                tracing::warn!(error = %e, len = raw.len(), "Discarding malformed inbound message");
                DispatchOutcome::Rejected
            }
        }
    }
}
