// SPDX-License-Identifier: MIT

//! Engine configuration
//!
//! Settings come from a YAML file or from the environment:
//! - `TYPELESS_ENV=development` turns on action tracing
//! - `TYPELESS_VERBOSITY` (`errors` or `trace`) overrides it
//! - `TYPELESS_SUBSCRIBER_CAPACITY` bounds subscriber lag

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::epic::{TypelessError, Verbosity};

const DEFAULT_NAME: &str = "root";
const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_subscriber_capacity() -> usize {
    DEFAULT_SUBSCRIBER_CAPACITY
}

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Name of the root epic every module epic is attached to
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub verbosity: Verbosity,

    /// Actions buffered per subscriber before it starts skipping
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            verbosity: Verbosity::default(),
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, TypelessError> {
        let mut config = Self::default();

        if let Ok(mode) = env::var("TYPELESS_ENV") {
            if mode.eq_ignore_ascii_case("development") {
                config.verbosity = Verbosity::Trace;
            }
        }

        if let Ok(verbosity) = env::var("TYPELESS_VERBOSITY") {
            config.verbosity = verbosity.parse()?;
        }

        if let Ok(capacity) = env::var("TYPELESS_SUBSCRIBER_CAPACITY") {
            config.subscriber_capacity = capacity.trim().parse().map_err(|_| {
                TypelessError::config(format!(
                    "TYPELESS_SUBSCRIBER_CAPACITY must be a positive integer, got '{}'",
                    capacity
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn validate(&self) -> Result<(), TypelessError> {
        if self.name.trim().is_empty() {
            return Err(TypelessError::config("name must not be empty"));
        }
        if self.subscriber_capacity == 0 {
            return Err(TypelessError::config(
                "subscriber_capacity must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Loads [`EngineConfig`] from YAML
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load and validate a config file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<EngineConfig, TypelessError> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse and validate a YAML document
    pub fn parse_yaml(content: &str) -> Result<EngineConfig, TypelessError> {
        let config: EngineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
