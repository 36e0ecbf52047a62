//! Settings document
//!
//! The server publishes `settings.json`; each key of `ports` names one
//! endpoint reachable at `<base_url>/<name>`. The display fields are kept for
//! front-ends but play no part in batching.

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Parsed settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Display name
    #[serde(default)]
    pub name: String,

    /// Background color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,

    /// Foreground color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg_color: Option<String>,

    /// Endpoint name to service port; only the names matter to clients
    #[serde(default)]
    pub ports: BTreeMap<String, Value>,

    /// Any other published fields
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Settings {
    /// Parse a settings document
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a settings document from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "Loading settings");
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Fetch `<base_url>/settings.json`
    pub async fn fetch(client: &reqwest::Client, base_url: &str) -> Result<Self> {
        let url = format!("{}/settings.json", base_url.trim_end_matches('/'));
        tracing::info!(url = %url, "Fetching settings");

        let response = client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(crate::BatchlineError::Config(format!(
                "Failed to fetch settings ({}): {}",
                status, url
            )));
        }

        let settings: Self = response.json().await?;
        tracing::debug!(
            name = %settings.name,
            endpoints = settings.ports.len(),
            "Settings loaded"
        );
        Ok(settings)
    }

    /// Configured endpoint names, sorted
    pub fn endpoint_names(&self) -> impl Iterator<Item = &str> {
        self.ports.keys().map(String::as_str)
    }
}

/// Address of endpoint `name` under `base_url`
pub fn endpoint_address(base_url: &str, name: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r##"{
        "name": "Musicazoo",
        "bg_color": "#000",
        "fg_color": "#0f0",
        "ports": {"queue": 5580, "volume": 5581, "wsgi": 9000},
        "log_database": "/var/log/queue.db"
    }"##;

    #[test]
    fn test_parse_sample() {
        let settings = Settings::parse(SAMPLE).unwrap();

        assert_eq!(settings.name, "Musicazoo");
        assert_eq!(settings.bg_color.as_deref(), Some("#000"));
        assert_eq!(
            settings.endpoint_names().collect::<Vec<_>>(),
            vec!["queue", "volume", "wsgi"]
        );
        assert_eq!(settings.extra["log_database"], "/var/log/queue.db");
    }

    #[test]
    fn test_parse_minimal() {
        let settings = Settings::parse("{}").unwrap();
        assert_eq!(settings.endpoint_names().count(), 0);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Settings::parse("[1, 2]").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.ports.len(), 3);
    }

    #[test]
    fn test_endpoint_address() {
        assert_eq!(
            endpoint_address("http://localhost:9000", "queue"),
            "http://localhost:9000/queue"
        );
        assert_eq!(
            endpoint_address("http://localhost:9000/", "queue"),
            "http://localhost:9000/queue"
        );
        assert_eq!(endpoint_address("", "queue"), "/queue");
    }
}
