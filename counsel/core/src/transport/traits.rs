//! Transport Traits
//!
//! The seam between the Connection Manager and the wire. A [`Connector`]
//! dials an endpoint and hands back a [`ChannelSocket`]; the manager owns the
//! socket for as long as it stays open and never shares it.
//!
//! The WebSocket implementation lives in `transport::websocket`; tests plug in
//! scripted connectors to drive the lifecycle without a network.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur on a live channel
///
/// Every variant is recoverable: the Connection Manager reacts to all of them
/// by scheduling a reconnect.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection to peer failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection was closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// The handshake did not finish within the connect timeout
    #[error("Connection timed out after {0} ms")]
    Timeout(u64),

    /// Failed to send message
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive message
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// IO error from underlying transport
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An established, bidirectional text channel
#[async_trait]
pub trait ChannelSocket: Send {
    /// Send one text frame
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next text frame
    ///
    /// Returns `None` once the peer has closed the channel. Control frames are
    /// handled internally and never surface here.
    async fn next_text(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the channel; errors are swallowed since the socket is going away
    async fn close(&mut self);
}

/// Dials endpoints
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a channel to `endpoint`
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn ChannelSocket>, TransportError>;
}
