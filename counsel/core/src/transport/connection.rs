//! Connection Manager
//!
//! Owns the lifecycle of every live channel in a session. Each channel runs as
//! its own task:
//!
//! ```text
//!   Disconnected ──► Connecting ──► Open ──┐
//!        ▲               │                 │ error / close
//!        │               │ failure/timeout │
//!        └───────────────┴─────────────────┘
//!                 sleep(fixed delay), forever
//! ```
//!
//! Reconnection uses a fixed per-channel delay with no backoff, no jitter and
//! no attempt limit; only an explicit [`ConnectionManager::close`] stops it.
//! Every transition is posted to the session inbox.
//!
//! Teardown cancels a [`CancellationToken`] that every await point in the
//! task selects on, so a reconnect timer firing concurrently with teardown
//! can never bring the channel back.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::config::ChannelSpec;
use super::traits::{ChannelSocket, Connector};
use crate::error::ClientError;
use crate::inbox::{post, InboundKind, InboxSender};
use crate::messages::{OriginId, OutboundMessage};

// ============================================================================
// State
// ============================================================================

/// Connectivity of one channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket; a reconnect may be pending
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Socket open; frames flow both ways
    Open,
    /// Socket being closed on request
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// Handle to an open channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(OriginId);

impl ConnectionHandle {
    /// Origin tag carried by everything this channel posts to the inbox
    #[must_use]
    pub fn origin(&self) -> OriginId {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0 .0)
    }
}

/// Timing shared by every channel of a manager
#[derive(Clone, Copy, Debug)]
pub struct ConnectionTiming {
    /// Maximum time allowed for a handshake
    pub connect_timeout: Duration,
    /// Interval between `ping` frames while open, `None` to disable
    pub heartbeat_interval: Option<Duration>,
}

impl Default for ConnectionTiming {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            heartbeat_interval: None,
        }
    }
}

// ============================================================================
// Manager
// ============================================================================

/// Manager-side record of one channel
struct Connection {
    endpoint: String,
    state: watch::Receiver<ConnectionState>,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Opens, feeds and tears down live channels
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    timing: ConnectionTiming,
    inbox: InboxSender,
    connections: HashMap<ConnectionHandle, Connection>,
}

impl ConnectionManager {
    /// Create a manager posting to `inbox`
    pub fn new(connector: Arc<dyn Connector>, timing: ConnectionTiming, inbox: InboxSender) -> Self {
        Self {
            connector,
            timing,
            inbox,
            connections: HashMap::new(),
        }
    }

    /// Open a channel and start its lifecycle task
    ///
    /// The task connects immediately and keeps reconnecting until the handle
    /// is closed. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidTarget`] if the endpoint needs an id and
    /// none was given. No connection is attempted in that case.
    pub fn open(&mut self, spec: &ChannelSpec, id: Option<&str>) -> Result<ConnectionHandle, ClientError> {
        let endpoint = spec.endpoint(id)?;
        let origin = OriginId::next();
        let handle = ConnectionHandle(origin);

        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = ChannelTask {
            handle,
            channel: spec.name,
            endpoint: endpoint.clone(),
            retry_delay: spec.reconnect_delay,
            timing: self.timing,
            connector: Arc::clone(&self.connector),
            inbox: self.inbox.clone(),
            state: state_tx,
            cancel: cancel.clone(),
        };

        tracing::info!(
            channel = spec.name,
            %handle,
            endpoint = %endpoint,
            retry_ms = millis(spec.reconnect_delay),
            "Opening channel"
        );

        let join = tokio::spawn(task.run(outbound_rx));
        self.connections.insert(
            handle,
            Connection {
                endpoint,
                state: state_rx,
                outbound: outbound_tx,
                cancel,
                task: Some(join),
            },
        );

        Ok(handle)
    }

    /// Send a message if the channel is open
    ///
    /// Returns `false` when the message was dropped because the channel is
    /// not open or no longer exists. Dropped messages are never queued.
    pub fn send(&self, handle: ConnectionHandle, message: &OutboundMessage) -> bool {
        let Some(conn) = self.connections.get(&handle) else {
            return false;
        };
        let state = *conn.state.borrow();
        if state != ConnectionState::Open {
            tracing::debug!(%handle, %state, "Dropping send on non-open channel");
            return false;
        }
        conn.outbound.send(message.to_frame()).is_ok()
    }

    /// Current state of a channel; closed or unknown handles are `Disconnected`
    #[must_use]
    pub fn state(&self, handle: ConnectionHandle) -> ConnectionState {
        self.connections
            .get(&handle)
            .map_or(ConnectionState::Disconnected, |c| *c.state.borrow())
    }

    /// Endpoint a channel dials
    #[must_use]
    pub fn endpoint(&self, handle: ConnectionHandle) -> Option<&str> {
        self.connections.get(&handle).map(|c| c.endpoint.as_str())
    }

    /// Handles of every channel not yet closed
    #[must_use]
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.connections.keys().copied().collect()
    }

    /// Tear down a channel
    ///
    /// Cancels any pending reconnect and closes the live socket. Closing an
    /// already closed handle does nothing. Returns whether the handle was live.
    pub fn close(&mut self, handle: ConnectionHandle) -> bool {
        match self.connections.remove(&handle) {
            Some(conn) => {
                conn.cancel.cancel();
                tracing::info!(%handle, endpoint = %conn.endpoint, "Channel closed");
                true
            }
            None => false,
        }
    }

    /// Tear down every channel without waiting
    pub fn close_all(&mut self) {
        for (_, conn) in self.connections.drain() {
            conn.cancel.cancel();
        }
    }

    /// Tear down every channel and wait for their tasks to finish
    pub async fn shutdown(&mut self) {
        let tasks: Vec<_> = self
            .connections
            .drain()
            .filter_map(|(_, mut conn)| {
                conn.cancel.cancel();
                conn.task.take()
            })
            .collect();

        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Channel task ended abnormally");
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close_all();
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("timing", &self.timing)
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Channel Task
// ============================================================================

/// Why an open socket stopped being served
enum OpenExit {
    Cancelled,
    Dropped,
}

/// State owned by one channel's lifecycle task
struct ChannelTask {
    handle: ConnectionHandle,
    channel: &'static str,
    endpoint: String,
    retry_delay: Duration,
    timing: ConnectionTiming,
    connector: Arc<dyn Connector>,
    inbox: InboxSender,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl ChannelTask {
    async fn run(self, mut outbound: mpsc::UnboundedReceiver<String>) {
        let mut attempt: u64 = 0;

        loop {
            self.transition(ConnectionState::Connecting);

            let connected = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = tokio::time::timeout(
                    self.timing.connect_timeout,
                    self.connector.connect(&self.endpoint),
                ) => result,
            };

            match connected {
                Ok(Ok(mut socket)) => {
                    // Anything queued while the previous socket was failing is stale.
                    while outbound.try_recv().is_ok() {}

                    self.transition(ConnectionState::Open);
                    tracing::info!(channel = self.channel, handle = %self.handle, "Channel open");

                    match self.serve(socket.as_mut(), &mut outbound).await {
                        OpenExit::Cancelled => {
                            self.transition(ConnectionState::Closing);
                            // A peer that stopped reading may never ack the close frame
                            if tokio::time::timeout(self.timing.connect_timeout, socket.close())
                                .await
                                .is_err()
                            {
                                tracing::warn!(channel = self.channel, handle = %self.handle, "Close handshake timed out");
                            }
                            break;
                        }
                        OpenExit::Dropped => {}
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        channel = self.channel,
                        handle = %self.handle,
                        endpoint = %self.endpoint,
                        error = %e,
                        "Connection attempt failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        channel = self.channel,
                        handle = %self.handle,
                        timeout_ms = millis(self.timing.connect_timeout),
                        "Connection attempt timed out"
                    );
                }
            }

            self.transition(ConnectionState::Disconnected);
            if self.cancel.is_cancelled() {
                break;
            }

            attempt += 1;
            tracing::info!(
                channel = self.channel,
                handle = %self.handle,
                attempt,
                delay_ms = millis(self.retry_delay),
                "Reconnect scheduled"
            );
            post(
                &self.inbox,
                self.handle.origin(),
                InboundKind::ReconnectScheduled {
                    attempt,
                    delay: self.retry_delay,
                },
            );

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.retry_delay) => {}
            }
        }

        self.transition(ConnectionState::Disconnected);
        tracing::debug!(channel = self.channel, handle = %self.handle, "Channel task finished");
    }

    /// Pump frames until the socket fails or the channel is cancelled
    ///
    /// Cancellation also interrupts a send the peer has stopped draining.
    async fn serve(
        &self,
        socket: &mut dyn ChannelSocket,
        outbound: &mut mpsc::UnboundedReceiver<String>,
    ) -> OpenExit {
        let mut heartbeat = self.timing.heartbeat_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return OpenExit::Cancelled,
                frame = socket.next_text() => match frame {
                    Some(Ok(text)) => {
                        tracing::debug!(handle = %self.handle, len = text.len(), "Frame received");
                        post(&self.inbox, self.handle.origin(), InboundKind::Frame(text));
                    }
                    Some(Err(e)) => {
                        tracing::warn!(channel = self.channel, handle = %self.handle, error = %e, "Channel error");
                        return OpenExit::Dropped;
                    }
                    None => {
                        tracing::info!(channel = self.channel, handle = %self.handle, "Channel closed by peer");
                        return OpenExit::Dropped;
                    }
                },
                Some(text) = outbound.recv() => {
                    let sent = tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return OpenExit::Cancelled,
                        sent = socket.send_text(text) => sent,
                    };
                    if let Err(e) = sent {
                        tracing::warn!(channel = self.channel, handle = %self.handle, error = %e, "Send failed");
                        return OpenExit::Dropped;
                    }
                }
                () = next_tick(heartbeat.as_mut()) => {
                    let sent = tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return OpenExit::Cancelled,
                        sent = socket.send_text(OutboundMessage::Ping.to_frame()) => sent,
                    };
                    if let Err(e) = sent {
                        tracing::warn!(channel = self.channel, handle = %self.handle, error = %e, "Heartbeat failed");
                        return OpenExit::Dropped;
                    }
                }
            }
        }
    }

    /// Record a state change and notify the session; repeated states are not reposted
    fn transition(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if changed {
            tracing::debug!(channel = self.channel, handle = %self.handle, state = %next, "Channel state");
            post(&self.inbox, self.handle.origin(), InboundKind::Status(next));
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

async fn next_tick(interval: Option<&mut tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
