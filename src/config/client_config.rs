//! Client configuration file handling
//!
//! Loads and saves ~/.config/batchline/config.yaml. Every field has a default,
//! so an empty file (or no file) yields the reference cadence.

use crate::endpoint::{EndpointConfig, HookPolicy, ProtocolViolationPolicy};
use crate::transport::{HttpTransportConfig, DEFAULT_CONTENT_TYPE};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Scheduling cadence and policies shared by every endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Delay before re-checking an empty queue
    #[serde(default = "default_idle_delay_ms")]
    pub idle_delay_ms: u64,

    /// Delay after the server answered
    #[serde(default = "default_success_delay_ms")]
    pub success_delay_ms: u64,

    /// Fixed backoff after a transport failure
    #[serde(default = "default_backoff_delay_ms")]
    pub backoff_delay_ms: u64,

    /// When connection hooks fire
    #[serde(default)]
    pub hook_policy: HookPolicy,

    /// Handling of mismatched reply arrays
    #[serde(default)]
    pub protocol_violation: ProtocolViolationPolicy,

    /// Event broadcast channel capacity per endpoint
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_idle_delay_ms() -> u64 {
    50
}

fn default_success_delay_ms() -> u64 {
    0
}

fn default_backoff_delay_ms() -> u64 {
    500
}

fn default_event_channel_capacity() -> usize {
    crate::endpoint::DEFAULT_EVENT_CHANNEL_CAPACITY
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            idle_delay_ms: default_idle_delay_ms(),
            success_delay_ms: default_success_delay_ms(),
            backoff_delay_ms: default_backoff_delay_ms(),
            hook_policy: HookPolicy::default(),
            protocol_violation: ProtocolViolationPolicy::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// HTTP transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Content type sent with each batch
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Request timeout; unset means no timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            content_type: default_content_type(),
            request_timeout_ms: None,
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every endpoint path is joined to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Local settings document; when unset it is fetched from
    /// `<base_url>/settings.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<PathBuf>,

    /// Scheduling cadence
    #[serde(default)]
    pub scheduling: SchedulingConfig,

    /// Transport settings
    #[serde(default)]
    pub transport: TransportSettings,
}

fn default_base_url() -> String {
    "http://localhost:9000".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Create a configuration with every default
    pub fn new() -> Self {
        Self {
            base_url: default_base_url(),
            settings_path: None,
            scheduling: SchedulingConfig::default(),
            transport: TransportSettings::default(),
        }
    }

    /// Load configuration from the default path, falling back to defaults
    /// when the file does not exist
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::new());
        }
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::BatchlineError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading batchline configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            base_url = %config.base_url,
            backoff_ms = config.scheduling.backoff_delay_ms,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving batchline configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/batchline/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("batchline");
        path.push("config.yaml");
        path
    }

    /// Set the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set a local settings document
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Scheduling configuration for endpoints
    pub fn endpoint_config(&self) -> EndpointConfig {
        let scheduling = &self.scheduling;
        EndpointConfig::default()
            .with_idle_delay(Duration::from_millis(scheduling.idle_delay_ms))
            .with_success_delay(Duration::from_millis(scheduling.success_delay_ms))
            .with_backoff_delay(Duration::from_millis(scheduling.backoff_delay_ms))
            .with_hook_policy(scheduling.hook_policy)
            .with_protocol_violation(scheduling.protocol_violation)
            .with_event_channel_capacity(scheduling.event_channel_capacity)
    }

    /// Options for the HTTP transport
    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            content_type: self.transport.content_type.clone(),
            request_timeout: self.transport.request_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: ClientConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ClientConfig::new());

        let endpoint = config.endpoint_config();
        assert_eq!(endpoint.idle_delay, Duration::from_millis(50));
        assert_eq!(endpoint.success_delay, Duration::ZERO);
        assert_eq!(endpoint.backoff_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
base_url: "http://jukebox.local"
scheduling:
  backoff_delay_ms: 2000
  hook_policy: every_cycle
  protocol_violation: silent
transport:
  request_timeout_ms: 1500
"#;
        let config: ClientConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.base_url, "http://jukebox.local");
        assert_eq!(config.scheduling.idle_delay_ms, 50);
        assert_eq!(config.scheduling.backoff_delay_ms, 2000);

        let endpoint = config.endpoint_config();
        assert_eq!(endpoint.hook_policy, HookPolicy::EveryCycle);
        assert_eq!(endpoint.protocol_violation, ProtocolViolationPolicy::Silent);

        let transport = config.transport_config();
        assert_eq!(transport.content_type, "text/json");
        assert_eq!(transport.request_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.yaml");

        let config = ClientConfig::new()
            .with_base_url("http://127.0.0.1:9000")
            .with_settings_path("/etc/batchline/settings.json");
        config.save(&path).unwrap();

        let loaded = ClientConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = ClientConfig::load(temp_dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(crate::BatchlineError::Config(_))));
    }

    #[test]
    fn test_default_path() {
        let path = ClientConfig::default_path();
        assert!(path.ends_with(".config/batchline/config.yaml"));
    }
}
