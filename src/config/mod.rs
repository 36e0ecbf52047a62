//! Configuration system
//!
//! Two documents drive a client:
//! - ~/.config/batchline/config.yaml: cadence, policies and transport options
//! - settings.json: the server's list of named endpoints

mod client_config;
mod settings;
pub mod validation;

pub use client_config::{ClientConfig, SchedulingConfig, TransportSettings};
pub use settings::{endpoint_address, Settings};
pub use validation::{
    validate_config, validate_config_result, validate_settings, validate_settings_result,
    ValidationError,
};
