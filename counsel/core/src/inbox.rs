//! Session Inbox
//!
//! Every producer in a session (connection tasks, simulations, reply readers)
//! pushes [`Inbound`] items into one unbounded channel. The session is the
//! only consumer, so all store mutation happens on one task in arrival order.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::messages::OriginId;
use crate::streaming::StreamEvent;
use crate::transport::ConnectionState;

/// An item queued for the session
#[derive(Clone, Debug, PartialEq)]
pub struct Inbound {
    /// Producer that queued the item
    pub origin: OriginId,
    /// What happened
    pub kind: InboundKind,
}

/// Payload of an [`Inbound`] item
#[derive(Clone, Debug, PartialEq)]
pub enum InboundKind {
    /// A channel changed connectivity state
    Status(ConnectionState),
    /// A channel will reconnect after `delay`
    ReconnectScheduled {
        /// Reconnects scheduled on this channel so far, starting at 1
        attempt: u64,
        /// Fixed delay before the attempt
        delay: Duration,
    },
    /// A raw text frame, live or simulated, awaiting the router
    Frame(String),
    /// Progress of a streamed reply
    Stream(StreamEvent),
    /// A simulation delivered its last scheduled event
    SimulationFinished,
}

/// Sending half held by producers
pub type InboxSender = mpsc::UnboundedSender<Inbound>;

/// Receiving half held by the session
pub type InboxReceiver = mpsc::UnboundedReceiver<Inbound>;

/// Create a new inbox
#[must_use]
pub fn inbox() -> (InboxSender, InboxReceiver) {
    mpsc::unbounded_channel()
}

/// Push an item; a closed inbox means the session is gone, which is not an error
pub(crate) fn post(tx: &InboxSender, origin: OriginId, kind: InboundKind) -> bool {
    tx.send(Inbound { origin, kind }).is_ok()
}
