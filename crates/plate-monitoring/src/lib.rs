//! Monitoring for the Plate application framework.
//!
//! Only structured logging is provided: applications call [`init_logging`]
//! once at startup and every crate logs through `tracing`.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

pub mod logging;

pub use logging::{init_logging, init_test_logging};

/// Environment variable overriding [`LoggingConfig::log_filter`]
pub const LOG_FILTER_ENV: &str = "PLATE_LOG_FILTER";

/// Environment variable overriding [`LoggingConfig::enable_json_logging`]
pub const LOG_JSON_ENV: &str = "PLATE_LOG_JSON";

/// Configuration for initializing logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Service name attached to the startup record
    pub service_name: String,
    /// Log level filter (e.g., "info,plate_core=debug"), used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Emit JSON records instead of pretty output
    pub enable_json_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: "plate".to_string(),
            log_filter: "info".to_string(),
            enable_json_logging: false,
        }
    }
}

impl LoggingConfig {
    /// Defaults overridden from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden from values returned by `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(filter) = lookup(LOG_FILTER_ENV) {
            config.log_filter = filter;
        }

        if let Some(json) = lookup(LOG_JSON_ENV) {
            match json.to_lowercase().as_str() {
                "true" | "1" => config.enable_json_logging = true,
                "false" | "0" => config.enable_json_logging = false,
                _ => warn!("Invalid {} value: {}", LOG_JSON_ENV, json),
            }
        }

        config
    }
}
