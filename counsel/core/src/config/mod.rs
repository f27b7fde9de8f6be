//! TOML Configuration File Support
//!
//! Centralized configuration loading for the client, supporting a TOML file at
//! `~/.config/counsel/client.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (see [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [transport]
//! host = "legal-backend.internal:8000"
//! workflow_reconnect_ms = 3000
//! notification_reconnect_ms = 5000
//! connect_timeout_ms = 5000
//! heartbeat_interval_ms = 0
//!
//! [api]
//! base_url = "http://legal-backend.internal:8000"
//! request_timeout_secs = 120
//!
//! [simulator]
//! single_interval_ms = 1000
//! debate_interval_ms = 2000
//! fallback_mode = "single"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::ApiConfig;
use crate::simulator::{SimulationMode, SimulatorConfig};
use crate::transport::config::TransportConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Transport section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportToml {
    /// Backend host, `host:port`
    pub host: Option<String>,

    /// Workflow channel endpoint template
    pub workflow_template: Option<String>,

    /// Notification channel endpoint template
    pub notification_template: Option<String>,

    /// Workflow channel reconnect delay in milliseconds
    pub workflow_reconnect_ms: Option<u64>,

    /// Notification channel reconnect delay in milliseconds
    pub notification_reconnect_ms: Option<u64>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Heartbeat interval in milliseconds (0 = disabled)
    pub heartbeat_interval_ms: Option<u64>,
}

/// API section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Backend base URL
    pub base_url: Option<String>,

    /// Non-streaming request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Simulator section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorToml {
    /// Single mode step interval in milliseconds
    pub single_interval_ms: Option<u64>,

    /// Debate mode step interval in milliseconds
    pub debate_interval_ms: Option<u64>,

    /// Mode used when a chat request falls back to simulation
    pub fallback_mode: Option<SimulationMode>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CounselToml {
    /// Transport configuration section
    pub transport: TransportToml,

    /// API configuration section
    pub api: ApiToml,

    /// Simulator configuration section
    pub simulator: SimulatorToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized configuration for a client session
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug, PartialEq)]
pub struct CounselConfig {
    /// Live channel configuration
    pub transport: TransportConfig,

    /// HTTP endpoint configuration
    pub api: ApiConfig,

    /// Simulator timing
    pub simulator: SimulatorConfig,

    /// Mode used when a chat request falls back to simulation
    pub fallback_mode: SimulationMode,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for CounselConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            api: ApiConfig::default(),
            simulator: SimulatorConfig::default(),
            fallback_mode: SimulationMode::Single,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl CounselConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the highest-priority source that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Reject values the client cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.host.trim().is_empty() {
            return Err(ConfigError::ValidationError("transport.host is empty".into()));
        }
        if self.transport.workflow_reconnect_ms == 0 || self.transport.notification_reconnect_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect delays must be greater than zero".into(),
            ));
        }
        if self.transport.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "transport.connect_timeout_ms must be greater than zero".into(),
            ));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "api.base_url must be an http(s) URL, got `{}`",
                self.api.base_url
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/counsel/client.toml` or
/// `~/.config/counsel/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("counsel").join("client.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed. A
/// missing config file is not an error. The result is not validated, since
/// CLI overrides may still replace bad values; call
/// [`CounselConfig::validate`] once they are applied.
pub fn load_config() -> Result<CounselConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
/// Validation is left to the caller, as with [`load_config`].
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<CounselConfig, ConfigError> {
    load_config_with(path.as_deref(), |key| std::env::var(key).ok())
}

/// Loading with an explicit environment lookup
fn load_config_with(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<CounselConfig, ConfigError> {
    let mut config = CounselConfig::default();

    if let Some(config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.to_path_buf(),
                    source: e,
                })?;

            let toml_config: CounselToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.to_path_buf());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, lookup);

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut CounselConfig, toml: &CounselToml) {
    // Transport settings
    if let Some(ref host) = toml.transport.host {
        config.transport.host.clone_from(host);
    }
    if let Some(ref template) = toml.transport.workflow_template {
        config.transport.workflow_template.clone_from(template);
    }
    if let Some(ref template) = toml.transport.notification_template {
        config.transport.notification_template.clone_from(template);
    }
    if let Some(delay) = toml.transport.workflow_reconnect_ms {
        config.transport.workflow_reconnect_ms = delay;
    }
    if let Some(delay) = toml.transport.notification_reconnect_ms {
        config.transport.notification_reconnect_ms = delay;
    }
    if let Some(timeout) = toml.transport.connect_timeout_ms {
        config.transport.connect_timeout_ms = timeout;
    }
    if let Some(interval) = toml.transport.heartbeat_interval_ms {
        config.transport.heartbeat_interval_ms = interval;
    }

    // API settings
    if let Some(ref url) = toml.api.base_url {
        config.api.base_url.clone_from(url);
    }
    if let Some(timeout) = toml.api.request_timeout_secs {
        config.api.request_timeout_secs = timeout;
    }

    // Simulator settings
    if let Some(interval) = toml.simulator.single_interval_ms {
        config.simulator.single_interval_ms = interval;
    }
    if let Some(interval) = toml.simulator.debate_interval_ms {
        config.simulator.debate_interval_ms = interval;
    }
    if let Some(mode) = toml.simulator.fallback_mode {
        config.fallback_mode = mode;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut CounselConfig, lookup: impl Fn(&str) -> Option<String>) {
    if config.transport.apply_env(&lookup) {
        config.source = ConfigSource::Env;
    }

    if let Some(url) = lookup("COUNSEL_API_URL").filter(|u| !u.trim().is_empty()) {
        config.api.base_url = url.trim().to_string();
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = lookup("COUNSEL_REQUEST_TIMEOUT").and_then(|v| v.trim().parse::<u64>().ok()) {
        config.api.request_timeout_secs = secs;
        config.source = ConfigSource::Env;
    }
    if let Some(mode) = lookup("COUNSEL_FALLBACK_MODE") {
        match mode.parse::<SimulationMode>() {
            Ok(mode) => {
                config.fallback_mode = mode;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring COUNSEL_FALLBACK_MODE"),
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Backend host override
    pub host: Option<String>,

    /// API base URL override
    pub api_url: Option<String>,

    /// Fallback mode override
    pub fallback_mode: Option<SimulationMode>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set host override
    #[must_use]
    pub fn with_host(mut self, host: String) -> Self {
        self.host = Some(host);
        self
    }

    /// Set API base URL override
    #[must_use]
    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = Some(url);
        self
    }

    /// Set fallback mode override
    #[must_use]
    pub fn with_fallback_mode(mut self, mode: SimulationMode) -> Self {
        self.fallback_mode = Some(mode);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut CounselConfig) {
        if self.host.is_some() || self.api_url.is_some() || self.fallback_mode.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref host) = self.host {
            config.transport.host.clone_from(host);
        }
        if let Some(ref url) = self.api_url {
            config.api.base_url.clone_from(url);
        }
        if let Some(mode) = self.fallback_mode {
            config.fallback_mode = mode;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
