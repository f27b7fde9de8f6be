//! Conversation and Workflow State Store
//!
//! The append-only record of everything a session received or originated,
//! plus the per-type projections the UI reads.
//!
//! # Design Philosophy
//!
//! The log is the source of truth. Projections are a left fold of the log by
//! entry type: singleton types (workflow status, feedback) are last-write-wins
//! and sequence types (arguments, debate turns) are append-only. The store
//! keeps the fold up to date incrementally on every [`ConversationStore::append`],
//! and [`Projections::fold`] recomputes it from scratch for verification.
//!
//! Insertion order is the only ordering guarantee; timestamps carried inside
//! events are never used to reorder anything.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::{
    AnalysisUpdate, CaseUpdate, DebateTurn, Feedback, GeneratedArgument, InboundEvent,
    Notification, WorkflowSnapshot, WorkflowStatus,
};
use crate::messages::{MessageId, UserMessage};

/// A finalized (or interrupted) assistant reply
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    /// Stream message ID
    pub id: MessageId,
    /// Final reply text
    pub content: String,
    /// Whether the stream ended with a `complete` chunk
    pub complete: bool,
}

/// One entry in the conversation log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LogEntry {
    /// A typed event from a live channel or the simulator
    Event(InboundEvent),

    /// A payload whose `type` this client does not route
    Unrecognized {
        /// The discriminant, when the payload had one
        tag: Option<String>,
        /// The payload as received
        payload: Value,
    },

    /// A message typed by the user
    User(UserMessage),

    /// A streamed assistant reply, recorded once it is finalized
    Reply(AssistantReply),

    /// Side-channel analysis delivered alongside a streamed reply
    Analysis {
        /// Reply the analysis arrived with, if one had started
        message_id: Option<MessageId>,
        /// Opaque analysis payload
        payload: Value,
    },
}

/// A log entry with its position in the session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Monotonic sequence number; keeps counting across [`ConversationStore::clear`]
    pub seq: u64,
    /// The entry
    pub entry: LogEntry,
}

/// Read-only per-type views of the log
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Projections {
    /// Last `workflow_update` received
    pub latest_workflow_status: Option<WorkflowStatus>,
    /// Every `argument_generated`, in arrival order
    pub all_arguments: Vec<GeneratedArgument>,
    /// Every `debate_turn`, in arrival order
    pub all_debate_turns: Vec<DebateTurn>,
    /// Last `feedback_ready` received
    pub latest_feedback: Option<Feedback>,
    /// Last `workflow_status` snapshot received
    pub latest_snapshot: Option<WorkflowSnapshot>,
    /// Last backend `error` message
    pub last_error: Option<String>,
    /// Last `analysis_update` from the notification channel
    pub latest_analysis: Option<AnalysisUpdate>,
    /// Every `case_update`, in arrival order
    pub case_updates: Vec<CaseUpdate>,
    /// Every `notification`, in arrival order
    pub notifications: Vec<Notification>,
}

impl Projections {
    /// Recompute projections from a sequence of entries
    pub fn fold<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> Self {
        let mut projections = Self::default();
        for entry in entries {
            projections.apply(entry);
        }
        projections
    }

    /// Fold a single entry into the projections
    fn apply(&mut self, entry: &LogEntry) {
        let LogEntry::Event(event) = entry else {
            return;
        };

        match event {
            InboundEvent::WorkflowUpdate(status) => {
                self.latest_workflow_status = Some(status.clone());
            }
            InboundEvent::ArgumentGenerated(argument) => self.all_arguments.push(argument.clone()),
            InboundEvent::DebateTurn(turn) => self.all_debate_turns.push(turn.clone()),
            InboundEvent::FeedbackReady(feedback) => self.latest_feedback = Some(feedback.clone()),
            InboundEvent::WorkflowStatus(snapshot) => {
                self.latest_snapshot = Some(snapshot.clone());
            }
            InboundEvent::Error(error) => self.last_error = Some(error.error.clone()),
            InboundEvent::AnalysisUpdate(update) => self.latest_analysis = Some(update.clone()),
            InboundEvent::CaseUpdate(update) => self.case_updates.push(update.clone()),
            InboundEvent::Notification(notification) => {
                self.notifications.push(notification.clone());
            }
            InboundEvent::ConnectionEstablished(_)
            | InboundEvent::Pong(_)
            | InboundEvent::Echo(_)
            | InboundEvent::Unknown => {}
        }
    }
}

/// The append-only conversation log with its projections
#[derive(Clone, Debug, Default)]
pub struct ConversationStore {
    records: Vec<LogRecord>,
    projections: Projections,
    next_seq: u64,
}

impl ConversationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and update projections; returns its sequence number
    pub fn append(&mut self, entry: LogEntry) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.projections.apply(&entry);
        self.records.push(LogRecord { seq, entry });
        seq
    }

    /// Current projections
    #[must_use]
    pub fn snapshot(&self) -> &Projections {
        &self.projections
    }

    /// The full log in insertion order
    #[must_use]
    pub fn log(&self) -> &[LogRecord] {
        &self.records
    }

    /// Records with a sequence number at or after `seq`
    #[must_use]
    pub fn records_since(&self, seq: u64) -> &[LogRecord] {
        let start = self.records.partition_point(|r| r.seq < seq);
        &self.records[start..]
    }

    /// Number of entries in the log
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Truncate the log and reset every projection
    ///
    /// Takes `&mut self`, so no append can interleave with the reset.
    pub fn clear(&mut self) {
        self.records.clear();
        self.projections = Projections::default();
        tracing::debug!(next_seq = self.next_seq, "Conversation history cleared");
    }
}
