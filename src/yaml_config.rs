//! YAML configuration file support.
//!
//! A YAML file captures a reusable run definition. Every field is optional;
//! anything left out falls back to the built-in default and can still be
//! overridden from the environment (see [`crate::config::Config`]).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration as StdDuration;
use thiserror::Error;

use crate::pacing::Pacing;
use crate::sink::OutputMode;

/// Errors that can occur when loading or parsing YAML configuration.
#[derive(Error, Debug)]
pub enum YamlConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Duration format for YAML: a bare number of seconds or a string such as
/// "20ms", "30s", "5m".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YamlDuration {
    Seconds(u64),
    String(String),
}

impl YamlDuration {
    pub fn to_std_duration(&self) -> Result<StdDuration, YamlConfigError> {
        match self {
            YamlDuration::Seconds(s) => Ok(StdDuration::from_secs(*s)),
            YamlDuration::String(s) => crate::utils::parse_duration_string(s)
                .map_err(|e| YamlConfigError::Validation(format!("Invalid duration '{}': {}", s, e))),
        }
    }
}

/// Root YAML configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct YamlConfig {
    /// Full URL orders are POSTed to.
    pub target: Option<String>,

    /// Number of orders to dispatch.
    pub orders: Option<usize>,

    pub launch_delay: Option<YamlDuration>,

    pub pacing: Option<Pacing>,

    /// Per-request timeout.
    pub timeout: Option<YamlDuration>,

    /// JSON file holding the order template.
    pub template_file: Option<String>,

    pub custom_headers: Option<String>,

    #[serde(default)]
    pub skip_tls_verify: bool,

    pub resolve_target_addr: Option<String>,

    pub metrics_port: Option<u16>,

    /// `console` or `tracing`.
    pub output: Option<OutputMode>,
}

impl YamlConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, YamlConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, YamlConfigError> {
        let config: YamlConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the durations parse; range checks happen once the final
    /// configuration is assembled.
    pub fn validate(&self) -> Result<(), YamlConfigError> {
        if let Some(ref delay) = self.launch_delay {
            delay.to_std_duration()?;
        }
        if let Some(ref timeout) = self.timeout {
            timeout.to_std_duration()?;
        }
        Ok(())
    }
}
