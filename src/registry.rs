//! Endpoint registry
//!
//! Builds one [`Endpoint`] per name listed in the settings document. The
//! registry is an ordinary value owned by whatever runs the front-end; there is
//! no process-wide instance.

use crate::config::{endpoint_address, validate_settings_result, ClientConfig, Settings};
use crate::endpoint::{ConnectionHooks, Endpoint, EndpointConfig};
use crate::transport::{BatchTransport, HttpTransport};
use crate::{BatchlineError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named endpoints built from a settings document
#[derive(Debug)]
pub struct EndpointRegistry {
    settings: Settings,
    endpoints: BTreeMap<String, Endpoint>,
}

impl EndpointRegistry {
    /// Build endpoints for every name in `settings`
    ///
    /// Every endpoint shares `transport`, `config` and `hooks`. Must be called
    /// inside a tokio runtime.
    pub fn from_settings(
        base_url: &str,
        settings: Settings,
        transport: Arc<dyn BatchTransport>,
        config: &EndpointConfig,
        hooks: ConnectionHooks,
    ) -> Result<Self> {
        validate_settings_result(&settings)?;

        let endpoints: BTreeMap<String, Endpoint> = settings
            .endpoint_names()
            .map(|name| {
                let endpoint = Endpoint::spawn(
                    endpoint_address(base_url, name),
                    transport.clone(),
                    config.clone(),
                    hooks.clone(),
                );
                (name.to_string(), endpoint)
            })
            .collect();

        tracing::info!(
            name = %settings.name,
            endpoints = endpoints.len(),
            "Endpoint registry initialized"
        );

        Ok(Self {
            settings,
            endpoints,
        })
    }

    /// Load settings as configured and build HTTP endpoints
    ///
    /// Reads `settings_path` when set, otherwise fetches
    /// `<base_url>/settings.json`.
    pub async fn bootstrap(config: &ClientConfig, hooks: ConnectionHooks) -> Result<Self> {
        let transport = HttpTransport::with_config(&config.transport_config())?;

        let settings = match config.settings_path {
            Some(ref path) => Settings::load(path)?,
            None => Settings::fetch(&reqwest::Client::new(), &config.base_url).await?,
        };

        Self::from_settings(
            &config.base_url,
            settings,
            Arc::new(transport),
            &config.endpoint_config(),
            hooks,
        )
    }

    /// Endpoint by name
    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    /// Endpoint by name, or [`BatchlineError::UnknownEndpoint`]
    pub fn endpoint(&self, name: &str) -> Result<&Endpoint> {
        self.get(name)
            .ok_or_else(|| BatchlineError::UnknownEndpoint(name.to_string()))
    }

    /// Endpoint names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    /// Name/endpoint pairs, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Endpoint)> {
        self.endpoints.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// The settings document the registry was built from
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Stop every endpoint's scheduling loop
    pub fn shutdown(&self) {
        for endpoint in self.endpoints.values() {
            endpoint.shutdown();
        }
        tracing::info!(endpoints = self.endpoints.len(), "Endpoint registry shut down");
    }
}
