//! Transport Configuration
//!
//! Endpoint templates and timing for the two live channels.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Default backend host (`host:port`, no scheme)
pub const DEFAULT_HOST: &str = "localhost:8000";

/// Workflow/debate socket, one per workflow id
pub const WORKFLOW_CHANNEL_TEMPLATE: &str = "ws://{host}/ws/{id}";

/// General notification socket
pub const NOTIFICATION_CHANNEL_TEMPLATE: &str = "ws://{host}/ws";

/// Transport configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Backend host substituted for `{host}` in the templates
    pub host: String,

    /// Workflow channel endpoint template
    pub workflow_template: String,

    /// Notification channel endpoint template
    pub notification_template: String,

    /// Fixed delay before reconnecting the workflow channel, in milliseconds
    pub workflow_reconnect_ms: u64,

    /// Fixed delay before reconnecting the notification channel, in milliseconds
    pub notification_reconnect_ms: u64,

    /// Connection timeout in milliseconds
    ///
    /// A handshake that takes longer counts as a failed attempt.
    pub connect_timeout_ms: u64,

    /// Interval between `ping` frames on an open channel (0 = disabled)
    pub heartbeat_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            workflow_template: WORKFLOW_CHANNEL_TEMPLATE.to_string(),
            notification_template: NOTIFICATION_CHANNEL_TEMPLATE.to_string(),
            workflow_reconnect_ms: 3000,
            notification_reconnect_ms: 5000,
            connect_timeout_ms: 5000,
            heartbeat_interval_ms: 0,
        }
    }
}

impl TransportConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `COUNSEL_HOST`: Backend host, e.g. `localhost:8000`
    /// - `COUNSEL_WORKFLOW_RECONNECT_MS`: Workflow channel reconnect delay
    /// - `COUNSEL_NOTIFY_RECONNECT_MS`: Notification channel reconnect delay
    /// - `COUNSEL_CONNECT_TIMEOUT`: Connection timeout in ms
    /// - `COUNSEL_HEARTBEAT_INTERVAL`: Heartbeat interval in ms, `0` to disable
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from a variable lookup; returns whether any applied
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        let mut applied = false;

        if let Some(host) = lookup("COUNSEL_HOST").filter(|h| !h.trim().is_empty()) {
            self.host = host.trim().to_string();
            applied = true;
        }

        let numeric = [
            ("COUNSEL_WORKFLOW_RECONNECT_MS", &mut self.workflow_reconnect_ms),
            ("COUNSEL_NOTIFY_RECONNECT_MS", &mut self.notification_reconnect_ms),
            ("COUNSEL_CONNECT_TIMEOUT", &mut self.connect_timeout_ms),
            ("COUNSEL_HEARTBEAT_INTERVAL", &mut self.heartbeat_interval_ms),
        ];
        for (key, slot) in numeric {
            if let Some(ms) = lookup(key).and_then(|v| v.trim().parse::<u64>().ok()) {
                *slot = ms;
                applied = true;
            }
        }

        applied
    }

    /// Channel spec for the workflow/debate socket
    #[must_use]
    pub fn workflow_channel(&self) -> ChannelSpec {
        ChannelSpec {
            name: "workflow",
            template: self.workflow_template.clone(),
            host: self.host.clone(),
            reconnect_delay: Duration::from_millis(self.workflow_reconnect_ms),
        }
    }

    /// Channel spec for the notification socket
    #[must_use]
    pub fn notification_channel(&self) -> ChannelSpec {
        ChannelSpec {
            name: "notification",
            template: self.notification_template.clone(),
            host: self.host.clone(),
            reconnect_delay: Duration::from_millis(self.notification_reconnect_ms),
        }
    }

    /// Connection timeout as a [`Duration`]
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Heartbeat interval, or `None` when disabled
    #[must_use]
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }
}

/// Everything the Connection Manager needs to open one kind of channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Channel name used in logs
    pub name: &'static str,
    /// Endpoint template with `{host}` and optional `{id}` placeholders
    pub template: String,
    /// Value substituted for `{host}`
    pub host: String,
    /// Fixed reconnect delay
    pub reconnect_delay: Duration,
}

impl ChannelSpec {
    /// Resolve the endpoint for `id`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidTarget`] when the template needs an id
    /// and `id` is missing or blank.
    pub fn endpoint(&self, id: Option<&str>) -> Result<String, ClientError> {
        let endpoint = self.template.replace("{host}", &self.host);
        if !endpoint.contains("{id}") {
            return Ok(endpoint);
        }

        match id.map(str::trim) {
            Some(id) if !id.is_empty() => Ok(endpoint.replace("{id}", id)),
            _ => Err(ClientError::InvalidTarget(format!(
                "{} channel requires a non-empty id",
                self.name
            ))),
        }
    }
}
