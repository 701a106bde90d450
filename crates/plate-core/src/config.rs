//! Configuration for flows
//!
//! Per-flow options can be declared in a YAML catalog and overridden from
//! the environment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use tracing::{info, warn};

use crate::error::CoreResult;

/// Environment variable forcing error-handling suppression for every flow
pub const SUPPRESS_ERROR_HANDLING_ENV: &str = "PLATE_SUPPRESS_ERROR_HANDLING";

/// Options of a single flow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowOptions {
    /// Do not react to ambient error messages while active
    #[serde(default)]
    pub suppress_error_handling: bool,

    /// The application's default flow
    #[serde(default)]
    pub is_default: bool,

    /// The flow may be used as a startup point
    #[serde(default)]
    pub is_startup_point: bool,
}

/// Options for every known flow, keyed by flow kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCatalogConfig {
    /// Options applied to flows without an entry
    #[serde(default)]
    pub defaults: FlowOptions,

    /// Per-flow options
    #[serde(default)]
    pub flows: HashMap<String, FlowOptions>,
}

impl FlowCatalogConfig {
    /// Parse a YAML catalog
    pub fn from_yaml_str(yaml: &str) -> CoreResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a YAML catalog from `path` and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::load_with(path, |key| env::var(key).ok())
    }

    /// Load a YAML catalog from `path` and apply overrides read through `lookup`
    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&yaml)?;
        config.apply_overrides(lookup);

        info!(path = %path.display(), flows = config.flows.len(), "Loaded flow catalog");
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(SUPPRESS_ERROR_HANDLING_ENV) {
            match parse_bool(&value) {
                Some(suppress) => {
                    self.defaults.suppress_error_handling = suppress;
                    for options in self.flows.values_mut() {
                        options.suppress_error_handling = suppress;
                    }
                }
                None => warn!("Invalid {} value: {}", SUPPRESS_ERROR_HANDLING_ENV, value),
            }
        }
    }

    /// Options for `flow_kind`, falling back to the defaults
    pub fn options_for(&self, flow_kind: &str) -> FlowOptions {
        self.flows
            .get(flow_kind)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone())
    }

    /// Kind of the flow flagged as default, if any
    pub fn default_flow(&self) -> Option<&str> {
        self.flows
            .iter()
            .find(|(_, options)| options.is_default)
            .map(|(kind, _)| kind.as_str())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
