//! Configuration validation
//!
//! Validates client configuration and settings documents:
//! - Base URL is an HTTP(S) URL
//! - Backoff delay is positive
//! - Transport options are usable
//! - Endpoint names are usable as path segments

use super::client_config::ClientConfig;
use super::settings::Settings;
use crate::BatchlineError;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub endpoint: Option<String>,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            endpoint: None,
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref endpoint) = self.endpoint {
            write!(f, "[{}] {}: {}", endpoint, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a client configuration
pub fn validate_config(config: &ClientConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
        errors.push(ValidationError::new(
            "base_url",
            format!("Invalid base URL: {}", config.base_url),
        ));
    }

    if config.scheduling.backoff_delay_ms == 0 {
        errors.push(ValidationError::new(
            "scheduling.backoff_delay_ms",
            "Backoff delay must be greater than 0",
        ));
    }

    if config.scheduling.event_channel_capacity == 0 {
        errors.push(ValidationError::new(
            "scheduling.event_channel_capacity",
            "Event channel capacity must be greater than 0",
        ));
    }

    if config.transport.content_type.trim().is_empty() {
        errors.push(ValidationError::new(
            "transport.content_type",
            "Content type cannot be empty",
        ));
    }

    if config.transport.request_timeout_ms == Some(0) {
        errors.push(ValidationError::new(
            "transport.request_timeout_ms",
            "Request timeout must be greater than 0 (omit it to disable)",
        ));
    }

    if config.scheduling.idle_delay_ms >= config.scheduling.backoff_delay_ms {
        tracing::warn!(
            idle_ms = config.scheduling.idle_delay_ms,
            backoff_ms = config.scheduling.backoff_delay_ms,
            "Backoff delay is not longer than the idle delay"
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the endpoint names of a settings document
pub fn validate_settings(settings: &Settings) -> ValidationResult {
    let mut errors = Vec::new();

    for name in settings.endpoint_names() {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(
                "ports",
                "Endpoint name cannot be empty",
            ));
        } else if name.contains('/') || name.contains(char::is_whitespace) {
            errors.push(
                ValidationError::new(
                    "ports",
                    "Endpoint name must be a single path segment",
                )
                .with_endpoint(name),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn into_config_error(errors: Vec<ValidationError>, what: &str) -> BatchlineError {
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    BatchlineError::Config(format!(
        "{} validation failed:\n  - {}",
        what,
        messages.join("\n  - ")
    ))
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &ClientConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| into_config_error(errors, "Configuration"))
}

/// Validate a settings document and return a Result
pub fn validate_settings_result(settings: &Settings) -> crate::Result<()> {
    validate_settings(settings).map_err(|errors| into_config_error(errors, "Settings"))
}
