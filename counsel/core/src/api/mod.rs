//! HTTP API Client
//!
//! The request/response half of the backend: the streaming and
//! non-streaming chat endpoints, plus the workflow REST calls that create the
//! workflows whose events arrive on the live channel.
//!
//! Any non-2xx status or transport failure is a [`RequestError`]. Callers in
//! this crate never surface it to the user; the session switches to the
//! Fallback Simulator instead.

mod client;
mod workflows;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use client::{ChatClient, ReplyBody};
pub use workflows::{
    AnalyzeArgument, CreateDebate, CreateWorkflow, DebateHistory, StartedWorkflow, WorkflowApi,
    WorkflowInfo,
};

/// Default backend base URL
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Errors from the HTTP endpoints
#[derive(Debug, Error)]
pub enum RequestError {
    /// The server answered with a non-success status
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        /// Endpoint path
        endpoint: String,
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// The request could not be sent or the response not read
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl RequestError {
    /// HTTP status, when the server answered at all
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

/// HTTP client settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Scheme, host and port of the backend, without a trailing path
    pub base_url: String,
    /// Timeout for non-streaming requests, in seconds
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl ApiConfig {
    /// Timeout as a [`Duration`]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Absolute URL for `path`
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

/// Body of a chat request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,
    /// Attached file identifiers
    #[serde(default)]
    pub files: Vec<String>,
    /// Session the message belongs to
    #[serde(default)]
    pub session_id: Option<String>,
    /// Case the conversation is about
    #[serde(default)]
    pub case_id: Option<String>,
    /// Prior conversation context
    #[serde(default)]
    pub context: Vec<Value>,
}

impl ChatRequest {
    /// Request with just a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Non-streaming chat reply
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Reply text
    pub response: String,
    /// Optional structured analysis
    #[serde(default)]
    pub analysis: Option<Value>,
    /// Optional suggested actions
    #[serde(default)]
    pub actions: Option<Value>,
    /// Session the backend attributed the reply to
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Turn a non-success response into a [`RequestError::Status`]
async fn check(endpoint: &str, response: reqwest::Response) -> Result<reqwest::Response, RequestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RequestError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}
