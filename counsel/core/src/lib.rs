//! Counsel Core - Real-Time Transport for the Counsel Legal Assistant
//!
//! This crate is the client-side plumbing between a legal-assistant UI and
//! its backend: live workflow and notification channels, streamed chat
//! replies, and a scripted fallback when the backend is unavailable. It has
//! no UI dependencies; a terminal front end, a web view or a test harness
//! all drive it the same way.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Backend                               │
//! │   ws://host/ws/{id}      ws://host/ws       POST /api/chat/stream │
//! └───────┬──────────────────────┬─────────────────────┬─────────────┘
//!         │                      │                     │
//! ┌───────┼──────────────────────┼─────────────────────┼─────────────┐
//! │       ▼                      ▼                     ▼             │
//! │  ┌──────────────────────────────────┐   ┌───────────────────┐    │
//! │  │        ConnectionManager         │   │ StreamAccumulator │    │
//! │  │ (fixed-delay reconnect per chan) │   │  (line decoder)   │    │
//! │  └────────────────┬─────────────────┘   └─────────┬─────────┘    │
//! │                   │        ┌───────────┐          │              │
//! │                   │        │ Simulator │ (on request failure)    │
//! │                   │        └─────┬─────┘          │              │
//! │                   ▼              ▼                ▼              │
//! │               ┌──────────────────────────────────────┐           │
//! │               │            Session inbox             │           │
//! │               └──────────────────┬───────────────────┘           │
//! │                                  ▼                               │
//! │     ┌──────────────┐     ┌──────────────────┐                    │
//! │     │MessageRouter │ ──► │ConversationStore │ ──► snapshot()     │
//! │     └──────────────┘     └──────────────────┘                    │
//! │                         COUNSEL CORE                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Session`]: The owned context for one conversation
//! - [`SessionUpdate`]: What the session applied, one per inbox item
//! - [`ConversationStore`]: Append-only log with per-type projections
//! - [`InboundEvent`]: Every message the live channels deliver
//! - [`StreamAccumulator`]: Reassembles a streamed reply from raw bytes
//!
//! # Quick Start
//!
//! ```ignore
//! use counsel_core::{load_config, Session, SessionUpdate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config()?;
//!     config.validate()?;
//!     let mut session = Session::new(config)?;
//!     session.open_workflow_channel("wf-42")?;
//!     session.ask("Is the landlord liable for the slip and fall?").await;
//!
//!     while let Some(update) = session.next_update().await {
//!         if let SessionUpdate::ReplyDelta { accumulated, .. } = update {
//!             println!("{accumulated}");
//!         }
//!     }
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`api`]: Chat and workflow HTTP endpoints
//! - [`config`]: TOML file, environment and CLI configuration
//! - [`error`]: Error types per failure class
//! - [`events`]: Typed inbound channel messages
//! - [`inbox`]: The single queue every producer posts to
//! - [`messages`]: Identifiers and client-originated messages
//! - [`router`]: Raw frame classification
//! - [`session`]: The session context
//! - [`simulator`]: Scripted fallback workflows
//! - [`store`]: Conversation log and projections
//! - [`streaming`]: Streamed reply reconstruction
//! - [`transport`]: Live channel lifecycle

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod inbox;
pub mod messages;
pub mod router;
pub mod session;
pub mod simulator;
pub mod store;
pub mod streaming;
pub mod transport;

// Re-exports for convenience
pub use api::{
    AnalyzeArgument, ApiConfig, ChatClient, ChatRequest, ChatResponse, CreateDebate,
    CreateWorkflow, DebateHistory, RequestError, StartedWorkflow, WorkflowApi, WorkflowInfo,
};
pub use error::{ClientError, ParseError};
pub use events::InboundEvent;
pub use messages::{MessageId, OriginId, OutboundMessage, SessionId, UserMessage};
pub use router::{DispatchOutcome, MessageRouter};
pub use session::{AskOnceOutcome, AskOutcome, Producer, ReplyHandle, Session, SessionUpdate};
pub use simulator::{SimulationHandle, SimulationMode, Simulator, SimulatorConfig};
pub use store::{AssistantReply, ConversationStore, LogEntry, LogRecord, Projections};

// Streaming exports
pub use streaming::{consume, FinishReason, StreamAccumulator, StreamEvent, StreamSession};

// Transport exports
pub use transport::{
    ChannelSocket, ConnectionHandle, ConnectionManager, ConnectionState, Connector,
    TransportConfig, TransportError,
};
#[cfg(feature = "websocket")]
pub use transport::WebSocketConnector;

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, CounselConfig,
};
