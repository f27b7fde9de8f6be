//! Session Context
//!
//! A [`Session`] is the explicitly owned context for one conversation. It
//! holds the only [`ConversationStore`] and is the single consumer of the
//! inbox every producer posts to:
//!
//! ```text
//!   ConnectionManager ─┐
//!   Simulator ─────────┼──► inbox ──► Session::next_update ──► router ──► store
//!   reply readers ─────┘
//! ```
//!
//! Producers are tagged with an origin. Tearing one down retires its origin,
//! and anything it queued before stopping is discarded on receipt, so a
//! cancelled producer never appends to the log.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{ChatClient, ChatRequest, ChatResponse, ReplyBody, WorkflowApi};
use crate::config::CounselConfig;
use crate::error::ClientError;
use crate::inbox::{inbox, post, Inbound, InboundKind, InboxReceiver, InboxSender};
use crate::messages::{MessageId, MessageRole, OriginId, OutboundMessage, SessionId, UserMessage};
use crate::router::{DispatchOutcome, MessageRouter};
use crate::simulator::{SimulationHandle, SimulationMode, Simulator};
use crate::store::{AssistantReply, ConversationStore, LogEntry, LogRecord, Projections};
use crate::streaming::{FinishReason, StreamEvent};
use crate::transport::{
    ConnectionHandle, ConnectionManager, ConnectionState, ConnectionTiming, Connector,
};

// ============================================================================
// Handles and Updates
// ============================================================================

/// Handle to a streamed reply being read
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReplyHandle(OriginId);

impl ReplyHandle {
    /// Origin tag carried by every event of this reply
    #[must_use]
    pub fn origin(&self) -> OriginId {
        self.0
    }
}

impl fmt::Display for ReplyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reply_{}", self.0 .0)
    }
}

/// A live producer feeding the inbox
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Producer {
    /// A workflow or notification channel
    Channel(ConnectionHandle),
    /// A fallback simulation
    Simulation(SimulationHandle),
    /// A streamed reply reader
    Reply(ReplyHandle),
}

impl fmt::Display for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(h) => write!(f, "{h}"),
            Self::Simulation(h) => write!(f, "{h}"),
            Self::Reply(h) => write!(f, "{h}"),
        }
    }
}

/// How [`Session::ask`] is being answered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AskOutcome {
    /// The backend accepted the request; the reply streams in
    Streaming(ReplyHandle),
    /// The backend failed; simulated events stand in for the reply
    Simulated(SimulationHandle),
}

/// How [`Session::ask_once`] was answered
#[derive(Clone, Debug, PartialEq)]
pub enum AskOnceOutcome {
    /// The backend replied; the reply is already recorded
    Answered(ChatResponse),
    /// The backend failed; simulated events stand in for the reply
    Simulated(SimulationHandle),
}

/// Something the session applied, reported to the consumer
#[derive(Clone, Debug, PartialEq)]
pub enum SessionUpdate {
    /// A channel changed state
    Connectivity {
        /// Channel that changed
        channel: ConnectionHandle,
        /// Its new state
        state: ConnectionState,
    },
    /// A channel will be redialed after `delay`
    ReconnectScheduled {
        /// Channel being redialed
        channel: ConnectionHandle,
        /// Reconnect attempts so far, counting this one
        attempt: u64,
        /// Fixed delay before the attempt
        delay: Duration,
    },
    /// A frame went through the Message Router
    Routed {
        /// Channel or simulation that produced it
        origin: Producer,
        /// What the router did with it
        outcome: DispatchOutcome,
    },
    /// Reply text grew
    ReplyDelta {
        /// Reply being streamed
        reply: ReplyHandle,
        /// Full text so far
        accumulated: String,
    },
    /// Analysis arrived alongside a reply
    ReplyAnalysis {
        /// Reply being streamed
        reply: ReplyHandle,
        /// Opaque analysis payload
        payload: Value,
    },
    /// A reply ended and was recorded
    ReplyFinished {
        /// Reply that ended
        reply: ReplyHandle,
        /// Final text
        content: String,
        /// How it ended
        reason: FinishReason,
    },
    /// A simulation delivered its last event
    SimulationFinished {
        /// Simulation that ended
        simulation: SimulationHandle,
    },
}

struct ReplyReader {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

// ============================================================================
// Session
// ============================================================================

/// One conversation with the backend
pub struct Session {
    id: SessionId,
    config: CounselConfig,
    case_id: Option<String>,
    store: ConversationStore,
    router: MessageRouter,
    connections: ConnectionManager,
    simulator: Simulator,
    chat: ChatClient,
    workflows: WorkflowApi,
    inbox_tx: InboxSender,
    inbox_rx: InboxReceiver,
    live: HashMap<OriginId, Producer>,
    replies: HashMap<ReplyHandle, ReplyReader>,
}

impl Session {
    /// Create a session that dials channels over WebSocket
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Request`] if the HTTP client cannot be built.
    #[cfg(feature = "websocket")]
    pub fn new(config: CounselConfig) -> Result<Self, ClientError> {
        Self::with_connector(config, Arc::new(crate::transport::WebSocketConnector::new()))
    }

    /// Create a session that dials channels through `connector`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Request`] if the HTTP client cannot be built.
    pub fn with_connector(
        config: CounselConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ClientError> {
        let chat = ChatClient::new(config.api.clone())?;
        let workflows = WorkflowApi::new(config.api.clone(), chat.http_client().clone());
        let (inbox_tx, inbox_rx) = inbox();

        let timing = ConnectionTiming {
            connect_timeout: config.transport.connect_timeout(),
            heartbeat_interval: config.transport.heartbeat_interval(),
        };
        let connections = ConnectionManager::new(connector, timing, inbox_tx.clone());
        let simulator = Simulator::new(config.simulator.clone(), inbox_tx.clone());

        let id = SessionId::new();
        tracing::info!(session = %id, host = %config.transport.host, "Session created");

        Ok(Self {
            id,
            config,
            case_id: None,
            store: ConversationStore::new(),
            router: MessageRouter::new(),
            connections,
            simulator,
            chat,
            workflows,
            inbox_tx,
            inbox_rx,
            live: HashMap::new(),
            replies: HashMap::new(),
        })
    }

    /// Session identifier sent with chat requests
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Configuration the session was built with
    #[must_use]
    pub fn config(&self) -> &CounselConfig {
        &self.config
    }

    /// Case that chat requests are attributed to
    pub fn set_case(&mut self, case_id: Option<String>) {
        self.case_id = case_id;
    }

    /// Workflow REST client sharing this session's connection pool
    #[must_use]
    pub fn workflows(&self) -> &WorkflowApi {
        &self.workflows
    }

    // ------------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------------

    /// Open the workflow/debate channel for `workflow_id`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidTarget`] if `workflow_id` is blank.
    pub fn open_workflow_channel(&mut self, workflow_id: &str) -> Result<ConnectionHandle, ClientError> {
        let spec = self.config.transport.workflow_channel();
        let handle = self.connections.open(&spec, Some(workflow_id))?;
        self.live.insert(handle.origin(), Producer::Channel(handle));
        Ok(handle)
    }

    /// Open the notification channel
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidTarget`] if the configured template
    /// expects an id.
    pub fn open_notification_channel(&mut self) -> Result<ConnectionHandle, ClientError> {
        let spec = self.config.transport.notification_channel();
        let handle = self.connections.open(&spec, None)?;
        self.live.insert(handle.origin(), Producer::Channel(handle));
        Ok(handle)
    }

    /// Send a command up a channel; `false` if it was dropped
    pub fn send(&self, handle: ConnectionHandle, message: &OutboundMessage) -> bool {
        self.connections.send(handle, message)
    }

    /// Close a channel; closing twice is the same as closing once
    pub fn close_channel(&mut self, handle: ConnectionHandle) -> bool {
        self.live.remove(&handle.origin());
        self.connections.close(handle)
    }

    /// Current state of a channel
    #[must_use]
    pub fn connection_state(&self, handle: ConnectionHandle) -> ConnectionState {
        self.connections.state(handle)
    }

    // ------------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------------

    /// Start a fallback simulation for `input`
    pub fn simulate(&mut self, mode: SimulationMode, input: &str) -> SimulationHandle {
        let handle = self.simulator.start(mode, input);
        self.live.insert(handle.origin(), Producer::Simulation(handle));
        handle
    }

    /// Cancel a simulation's pending events
    pub fn cancel_simulation(&mut self, handle: SimulationHandle) -> bool {
        self.live.remove(&handle.origin());
        self.simulator.cancel(handle)
    }

    // ------------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------------

    /// Ask the backend and stream the reply
    ///
    /// The user message is logged first. If the streaming endpoint fails,
    /// the configured fallback simulation runs instead and the failure is
    /// only logged.
    pub async fn ask(&mut self, message: &str) -> AskOutcome {
        let request = self.record_question(message);

        match self.chat.stream_reply(&request).await {
            Ok(body) => AskOutcome::Streaming(self.spawn_reader(body)),
            Err(e) => {
                tracing::warn!(
                    session = %self.id,
                    status = ?e.status(),
                    error = %e,
                    "Streaming reply failed, falling back to simulation"
                );
                AskOutcome::Simulated(self.simulate(self.config.fallback_mode, message))
            }
        }
    }

    /// Ask the backend for a complete reply in one response
    ///
    /// When the request fails a simulation is started in its place and its
    /// handle returned, so it can be cancelled on its own.
    pub async fn ask_once(&mut self, message: &str) -> AskOnceOutcome {
        let request = self.record_question(message);

        match self.chat.reply(&request).await {
            Ok(response) => {
                let reply = AssistantReply {
                    id: MessageId::new(),
                    content: response.response.clone(),
                    complete: true,
                };
                if let Some(ref analysis) = response.analysis {
                    self.store.append(LogEntry::Analysis {
                        message_id: Some(reply.id.clone()),
                        payload: analysis.clone(),
                    });
                }
                self.store.append(LogEntry::Reply(reply));
                AskOnceOutcome::Answered(response)
            }
            Err(e) => {
                tracing::warn!(
                    session = %self.id,
                    status = ?e.status(),
                    error = %e,
                    "Chat request failed, falling back to simulation"
                );
                AskOnceOutcome::Simulated(self.simulate(self.config.fallback_mode, message))
            }
        }
    }

    /// Stop reading a streamed reply; nothing further from it is recorded
    pub fn cancel_reply(&mut self, handle: ReplyHandle) -> bool {
        self.live.remove(&handle.origin());
        match self.replies.remove(&handle) {
            Some(reader) => {
                reader.cancel.cancel();
                tracing::debug!(%handle, "Reply cancelled");
                true
            }
            None => false,
        }
    }

    fn record_question(&mut self, message: &str) -> ChatRequest {
        let context = self.context();
        self.store.append(LogEntry::User(UserMessage::new(message)));

        ChatRequest {
            message: message.to_string(),
            files: Vec::new(),
            session_id: Some(self.id.to_string()),
            case_id: self.case_id.clone(),
            context,
        }
    }

    /// Prior turns of the conversation, oldest first
    fn context(&self) -> Vec<Value> {
        self.store
            .log()
            .iter()
            .filter_map(|record| match &record.entry {
                LogEntry::User(m) => Some(json!({ "role": MessageRole::User, "content": m.content })),
                LogEntry::Reply(r) => {
                    Some(json!({ "role": MessageRole::Assistant, "content": r.content }))
                }
                _ => None,
            })
            .collect()
    }

    fn spawn_reader(&mut self, body: ReplyBody) -> ReplyHandle {
        let handle = ReplyHandle(OriginId::next());
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tx = self.inbox_tx.clone();

        let task = tokio::spawn(async move {
            let events = body.into_events();
            futures::pin_mut!(events);

            loop {
                let event = tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    event = events.next() => event,
                };
                let Some(event) = event else { break };
                if !post(&tx, handle.origin(), InboundKind::Stream(event)) {
                    break;
                }
            }
        });

        tracing::debug!(session = %self.id, %handle, "Reading streamed reply");
        self.live.insert(handle.origin(), Producer::Reply(handle));
        self.replies.insert(handle, ReplyReader { cancel, task });
        handle
    }

    // ------------------------------------------------------------------------
    // Inbox
    // ------------------------------------------------------------------------

    /// Wait for the next inbox item and apply it
    ///
    /// Returns `None` once nothing is queued and no producer is live, since
    /// nothing could arrive after that.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            let item = match self.inbox_rx.try_recv() {
                Ok(item) => item,
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {
                    if self.live.is_empty() {
                        return None;
                    }
                    self.inbox_rx.recv().await?
                }
            };

            if let Some(update) = self.apply(item) {
                return Some(update);
            }
        }
    }

    /// Apply everything already queued without waiting
    pub fn process_pending(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Ok(item) = self.inbox_rx.try_recv() {
            updates.extend(self.apply(item));
        }
        updates
    }

    fn apply(&mut self, Inbound { origin, kind }: Inbound) -> Option<SessionUpdate> {
        let Some(&producer) = self.live.get(&origin) else {
            tracing::trace!(%origin, "Dropping inbox item from retired origin");
            return None;
        };

        match (producer, kind) {
            (Producer::Channel(channel), InboundKind::Status(state)) => {
                Some(SessionUpdate::Connectivity { channel, state })
            }
            (Producer::Channel(channel), InboundKind::ReconnectScheduled { attempt, delay }) => {
                Some(SessionUpdate::ReconnectScheduled {
                    channel,
                    attempt,
                    delay,
                })
            }
            (Producer::Channel(_) | Producer::Simulation(_), InboundKind::Frame(frame)) => {
                let outcome = self.router.dispatch(&frame, &mut self.store);
                Some(SessionUpdate::Routed {
                    origin: producer,
                    outcome,
                })
            }
            (Producer::Simulation(simulation), InboundKind::SimulationFinished) => {
                self.live.remove(&origin);
                self.simulator.finished(simulation);
                Some(SessionUpdate::SimulationFinished { simulation })
            }
            (Producer::Reply(reply), InboundKind::Stream(event)) => Some(self.apply_stream(reply, event)),
            (producer, kind) => {
                tracing::debug!(%producer, ?kind, "Ignoring inbox item not expected from this producer");
                None
            }
        }
    }

    fn apply_stream(&mut self, reply: ReplyHandle, event: StreamEvent) -> SessionUpdate {
        match event {
            StreamEvent::Delta { accumulated, .. } => SessionUpdate::ReplyDelta { reply, accumulated },
            StreamEvent::Analysis {
                message_id,
                payload,
            } => {
                self.store.append(LogEntry::Analysis {
                    message_id,
                    payload: payload.clone(),
                });
                SessionUpdate::ReplyAnalysis { reply, payload }
            }
            StreamEvent::Finished {
                message_id,
                content,
                reason,
            } => {
                self.live.remove(&reply.origin());
                self.replies.remove(&reply);
                self.store.append(LogEntry::Reply(AssistantReply {
                    id: message_id,
                    content: content.clone(),
                    complete: reason == FinishReason::Completed,
                }));
                tracing::debug!(%reply, ?reason, chars = content.chars().count(), "Reply recorded");
                SessionUpdate::ReplyFinished {
                    reply,
                    content,
                    reason,
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    /// Per-type projections of the log
    #[must_use]
    pub fn snapshot(&self) -> &Projections {
        self.store.snapshot()
    }

    /// The log in append order
    #[must_use]
    pub fn log(&self) -> &[LogRecord] {
        self.store.log()
    }

    /// Empty the log and every projection at once
    pub fn clear_history(&mut self) {
        self.store.clear();
        tracing::info!(session = %self.id, "History cleared");
    }

    /// Tear down every channel, simulation and reply reader and wait for them
    pub async fn shutdown(&mut self) {
        self.live.clear();
        self.connections.shutdown().await;
        self.simulator.shutdown().await;

        let readers: Vec<_> = self.replies.drain().map(|(_, r)| r).collect();
        for reader in readers {
            reader.cancel.cancel();
            if let Err(e) = reader.task.await {
                tracing::warn!(error = %e, "Reply reader ended abnormally");
            }
        }

        tracing::info!(session = %self.id, "Session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for (_, reader) in self.replies.drain() {
            reader.cancel.cancel();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("log_len", &self.store.len())
            .field("live", &self.live.len())
            .field("connections", &self.connections)
            .field("simulator", &self.simulator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelSocket, TransportError};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct Refusing;

    #[async_trait]
    impl Connector for Refusing {
        async fn connect(&self, endpoint: &str) -> Result<Box<dyn ChannelSocket>, TransportError> {
            Err(TransportError::ConnectionFailed(endpoint.to_string()))
        }
    }

    fn session() -> Session {
        Session::with_connector(CounselConfig::default(), Arc::new(Refusing)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_flows_through_router_into_store() {
        let mut session = session();
        let handle = session.simulate(SimulationMode::Single, "texting while walking");

        let mut routed = 0;
        while let Some(update) = session.next_update().await {
            match update {
                SessionUpdate::Routed { origin, outcome } => {
                    assert_eq!(origin, Producer::Simulation(handle));
                    assert!(matches!(outcome, DispatchOutcome::Routed { .. }));
                    routed += 1;
                }
                SessionUpdate::SimulationFinished { simulation } => {
                    assert_eq!(simulation, handle);
                }
                other => panic!("unexpected update {other:?}"),
            }
        }

        assert_eq!(routed, 3);
        assert_eq!(session.snapshot().all_arguments.len(), 2);
        assert!(session.snapshot().latest_feedback.is_some());
    }

    #[tokio::test]
    async fn test_next_update_ends_when_nothing_is_live() {
        let mut session = session();
        assert_eq!(session.next_update().await, None);
    }

    #[tokio::test]
    async fn test_closed_channel_frames_are_discarded() {
        let mut session = session();
        let handle = session.open_workflow_channel("wf-9").unwrap();
        assert!(session.close_channel(handle));
        assert!(!session.close_channel(handle));

        post(
            &session.inbox_tx,
            handle.origin(),
            InboundKind::Frame(
                r#"{"type":"workflow_update","status":"running","progress":0.5}"#.into(),
            ),
        );

        session.process_pending();
        assert!(session.log().is_empty());
        assert!(session.snapshot().latest_workflow_status.is_none());
    }

    #[tokio::test]
    async fn test_blank_workflow_id_is_invalid_target() {
        let mut session = session();
        let result = session.open_workflow_channel("  ");
        assert!(matches!(result, Err(ClientError::InvalidTarget(_))));
        assert_eq!(session.next_update().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_simulation_appends_nothing() {
        let mut session = session();
        let handle = session.simulate(SimulationMode::Debate, "contract dispute");

        assert!(session.cancel_simulation(handle));
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(session.process_pending().is_empty());
        assert!(session.log().is_empty());
    }

    #[tokio::test]
    async fn test_reply_stream_is_recorded() {
        let mut session = session();
        let reply = ReplyHandle(OriginId::next());
        session.live.insert(reply.origin(), Producer::Reply(reply));

        let message_id = MessageId::new();
        for kind in [
            InboundKind::Stream(StreamEvent::Delta {
                message_id: message_id.clone(),
                delta: "Hel".into(),
                accumulated: "Hel".into(),
            }),
            InboundKind::Stream(StreamEvent::Analysis {
                message_id: Some(message_id.clone()),
                payload: json!({"risk": "low"}),
            }),
            InboundKind::Stream(StreamEvent::Finished {
                message_id: message_id.clone(),
                content: "Hello".into(),
                reason: FinishReason::Completed,
            }),
        ] {
            post(&session.inbox_tx, reply.origin(), kind);
        }

        let updates = session.process_pending();
        assert_eq!(updates.len(), 3);
        assert_eq!(
            updates[2],
            SessionUpdate::ReplyFinished {
                reply,
                content: "Hello".into(),
                reason: FinishReason::Completed,
            }
        );

        match &session.log()[1].entry {
            LogEntry::Reply(r) => {
                assert_eq!(r.content, "Hello");
                assert!(r.complete);
            }
            other => panic!("expected reply, got {other:?}"),
        }
        assert_eq!(session.next_update().await, None);
    }

    #[tokio::test]
    async fn test_context_lists_prior_turns() {
        let mut session = session();
        session.record_question("first question");
        session.store.append(LogEntry::Reply(AssistantReply {
            id: MessageId::new(),
            content: "first answer".into(),
            complete: true,
        }));

        let request = session.record_question("second question");

        assert_eq!(
            request.context,
            vec![
                json!({"role": "user", "content": "first question"}),
                json!({"role": "assistant", "content": "first answer"}),
            ]
        );
        assert_eq!(request.session_id.as_deref(), Some(session.id().0.as_str()));
    }

    #[tokio::test]
    async fn test_clear_history_resets_projections() {
        let mut session = session();
        let sim = session.simulate(SimulationMode::Single, "texting while walking");
        post(
            &session.inbox_tx,
            sim.origin(),
            InboundKind::Frame(
                r#"{"type":"argument_generated","agent":"prosecutor","content":"x","thinking":""}"#
                    .into(),
            ),
        );
        session.process_pending();
        assert_eq!(session.snapshot().all_arguments.len(), 1);

        session.clear_history();

        assert!(session.log().is_empty());
        assert_eq!(session.snapshot(), &Projections::default());
        session.shutdown().await;
    }
}
