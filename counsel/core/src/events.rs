//! Inbound Events
//!
//! Every message the backend can push down a live channel, as one closed sum
//! type discriminated by the JSON `type` field. Both the workflow socket
//! (`/ws/{workflow_id}`) and the notification socket (`/ws`) decode into
//! [`InboundEvent`]; a tag this client does not know decodes to
//! [`InboundEvent::Unknown`] instead of failing.
//!
//! # Wire Format
//!
//! ```json
//! {"type": "workflow_update", "status": "running", "current_step": "research", "progress": 0.4}
//! {"type": "argument_generated", "agent": "prosecutor", "content": "...", "thinking": "...", "timestamp": "..."}
//! {"type": "debate_turn", "turn": 1, "prosecutor": {"argument": "...", "thinking": "..."},
//!  "defender": {"response": "...", "thinking": "..."}}
//! {"type": "feedback_ready", "recommendations": [], "strengths": [], "weaknesses": []}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;

/// A message received on a live channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    // ============================================
    // Workflow Channel
    // ============================================
    /// Workflow progress; replaces the current status wholesale
    WorkflowUpdate(WorkflowStatus),

    /// An agent produced an argument
    ArgumentGenerated(GeneratedArgument),

    /// One prosecutor/defender exchange in debate mode
    DebateTurn(DebateTurn),

    /// Final feedback for the workflow
    FeedbackReady(Feedback),

    /// Sent once by the backend right after the socket is accepted
    ConnectionEstablished(ConnectionEstablished),

    /// Full status snapshot, sent on connect and in reply to `get_status`
    WorkflowStatus(WorkflowSnapshot),

    /// Backend-side failure report
    Error(BackendError),

    /// Reply to a `ping`
    Pong(Pong),

    /// Backend echo of a client message it did not understand
    Echo(Echo),

    // ============================================
    // Notification Channel
    // ============================================
    /// Progress of a background case analysis
    AnalysisUpdate(AnalysisUpdate),

    /// A case was created, changed or removed
    CaseUpdate(CaseUpdate),

    /// General user-facing notification
    Notification(Notification),

    /// Any `type` this client does not recognize
    #[serde(other)]
    Unknown,
}

impl InboundEvent {
    /// The wire discriminant of this event
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::WorkflowUpdate(_) => "workflow_update",
            Self::ArgumentGenerated(_) => "argument_generated",
            Self::DebateTurn(_) => "debate_turn",
            Self::FeedbackReady(_) => "feedback_ready",
            Self::ConnectionEstablished(_) => "connection_established",
            Self::WorkflowStatus(_) => "workflow_status",
            Self::Error(_) => "error",
            Self::Pong(_) => "pong",
            Self::Echo(_) => "echo",
            Self::AnalysisUpdate(_) => "analysis_update",
            Self::CaseUpdate(_) => "case_update",
            Self::Notification(_) => "notification",
            Self::Unknown => "unknown",
        }
    }

    /// Enforce value invariants the type system cannot express
    ///
    /// `progress` is clamped into `[0, 1]` (NaN becomes 0). A debate turn
    /// numbered 0 is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidField`] when a field value is unusable.
    pub fn normalize(self) -> Result<Self, ParseError> {
        match self {
            Self::WorkflowUpdate(mut status) => {
                status.progress = clamp_progress(status.progress);
                Ok(Self::WorkflowUpdate(status))
            }
            Self::DebateTurn(turn) if turn.turn == 0 => Err(ParseError::InvalidField {
                field: "turn",
                reason: "debate turns are numbered from 1".to_string(),
            }),
            other => Ok(other),
        }
    }
}

fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Workflow Payloads
// ============================================================================

/// Workflow progress report
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    /// Backend status string (`pending`, `running`, `completed`, ...)
    pub status: String,
    /// Step currently executing
    #[serde(default, alias = "currentStep")]
    pub current_step: Option<String>,
    /// Fraction complete, within `[0, 1]`
    #[serde(default)]
    pub progress: f64,
}

/// An argument produced by one of the agents
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArgument {
    /// Agent name (`prosecutor`, `defender`, `analyst`, ...)
    pub agent: String,
    /// The argument text
    pub content: String,
    /// Agent reasoning shown alongside the argument
    #[serde(default)]
    pub thinking: String,
    /// ISO-8601 timestamp assigned by the sender
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// The prosecutor half of a debate turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProsecutorMove {
    /// Argument put forward
    pub argument: String,
    /// Reasoning behind it
    #[serde(default)]
    pub thinking: String,
}

/// The defender half of a debate turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenderMove {
    /// Response to the prosecutor
    pub response: String,
    /// Reasoning behind it
    #[serde(default)]
    pub thinking: String,
}

/// One exchange in debate mode
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateTurn {
    /// Turn number, starting at 1
    pub turn: u32,
    /// Prosecutor's move
    pub prosecutor: ProsecutorMove,
    /// Defender's move
    pub defender: DefenderMove,
}

/// Final assessment of a workflow
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Suggested next steps
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Strong points of the case
    #[serde(default)]
    pub strengths: Vec<String>,
    /// Weak points of the case
    #[serde(default)]
    pub weaknesses: Vec<String>,
    /// Free-form summary (the backend sends this as `feedback`)
    #[serde(default, alias = "feedback", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Handshake confirmation from the workflow socket
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEstablished {
    /// Workflow the socket is subscribed to
    #[serde(default)]
    pub workflow_id: Option<String>,
    /// Server time of the handshake
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Full workflow status snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    /// Backend status string
    pub status: String,
    /// Step currently executing
    #[serde(default, alias = "currentStep")]
    pub current_step: Option<String>,
    /// Steps already finished, in order
    #[serde(default)]
    pub steps_completed: Vec<String>,
    /// Server time of the snapshot
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Backend error report
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendError {
    /// Error description
    #[serde(default)]
    pub error: String,
    /// Server time of the failure
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Heartbeat reply
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    /// Server time of the reply
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Backend echo of an unrecognized client message
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    /// The client message as the backend received it
    #[serde(default)]
    pub original: Value,
}

// ============================================================================
// Notification Payloads
// ============================================================================

/// Background analysis progress
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisUpdate {
    /// Analysis job identifier
    #[serde(default)]
    pub analysis_id: Option<String>,
    /// Job status
    #[serde(default)]
    pub status: Option<String>,
    /// Opaque analysis payload
    #[serde(default)]
    pub data: Value,
}

/// Case lifecycle change
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseUpdate {
    /// Case identifier
    #[serde(default)]
    pub case_id: Option<String>,
    /// What happened (`created`, `updated`, `deleted`)
    #[serde(default)]
    pub action: Option<String>,
    /// Opaque case payload
    #[serde(default)]
    pub data: Value,
}

/// Notification severity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyLevel {
    /// Warning
    Warning,
    /// Error
    Error,
    /// Success
    Success,
    /// Informational (also used for unrecognized levels)
    #[default]
    #[serde(other)]
    Info,
}

/// User-facing notification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity
    #[serde(default)]
    pub level: NotifyLevel,
    /// Optional title
    #[serde(default)]
    pub title: Option<String>,
    /// Notification body
    pub message: String,
}
