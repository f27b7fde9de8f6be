//! Transport Layer for the Live Channels
//!
//! Provides the Connection Manager and the abstraction it dials through:
//! - [`Connector`] / [`ChannelSocket`]: how a channel reaches the backend
//! - `WebSocketConnector`: the `tokio-tungstenite` implementation
//! - [`ConnectionManager`]: lifecycle, fixed-delay reconnection, teardown
//!
//! # Design Philosophy
//!
//! Channel tasks never touch session state. They post connectivity changes
//! and raw frames to the session inbox and the session decides what to keep,
//! so a channel torn down mid-flight cannot write anything after the fact.

pub mod config;
pub mod connection;
pub mod traits;
#[cfg(feature = "websocket")]
pub mod websocket;

// Re-exports for convenience
pub use config::{ChannelSpec, TransportConfig};
pub use connection::{ConnectionHandle, ConnectionManager, ConnectionState, ConnectionTiming};
pub use traits::{ChannelSocket, Connector, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;
