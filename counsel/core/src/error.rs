//! Error Types
//!
//! One error enum per failure class. None of them is fatal: transport errors
//! schedule a reconnect, parse errors are logged and skipped, request errors
//! switch the session to simulated data, and an invalid target just means no
//! connection is attempted.

use thiserror::Error;

pub use crate::api::RequestError;
pub use crate::config::ConfigError;
pub use crate::transport::TransportError;

/// A payload that could not be turned into an event
#[derive(Debug, Error)]
pub enum ParseError {
    /// Not valid JSON, or JSON that does not fit the event shape
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON whose top level is not an object
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// A field value that violates an event invariant
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Offending field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Umbrella error for the client API
#[derive(Debug, Error)]
pub enum ClientError {
    /// A channel was requested without the id it needs
    #[error("invalid channel target: {0}")]
    InvalidTarget(String),

    /// Live transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed inbound payload
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// HTTP request failure
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}
