use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tokio::time::Duration;

use crate::client::ClientConfig;
use crate::dispatcher::DispatchConfig;
use crate::order::{OrderPayload, TemplateError};
use crate::pacing::Pacing;
use crate::sink::OutputMode;
use crate::utils::parse_duration_string;
use crate::yaml_config::{YamlConfig, YamlConfigError};

pub const DEFAULT_TARGET_URL: &str = "http://localhost:8081/order";
pub const DEFAULT_ORDER_COUNT: usize = 10_000;
pub const DEFAULT_LAUNCH_DELAY: Duration = Duration::from_millis(20);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Every environment variable the generator reads.
pub const ENV_VARS: &[&str] = &[
    "CONFIG_FILE",
    "TARGET_URL",
    "ORDER_COUNT",
    "LAUNCH_DELAY",
    "PACING",
    "REQUEST_TIMEOUT",
    "TEMPLATE_FILE",
    "CUSTOM_HEADERS",
    "RESOLVE_TARGET_ADDR",
    "SKIP_TLS_VERIFY",
    "METRICS_PORT",
    "METRIC_NAMESPACE",
    "OUTPUT",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Yaml(#[from] YamlConfigError),

    #[error("Invalid value for {var}: '{value}'. {message}")]
    InvalidValue {
        var: &'static str,
        value: String,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Main configuration for a generator run.
///
/// Assembled as defaults, then the YAML file named by `CONFIG_FILE`, then
/// individual environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub target_url: String,
    pub order_count: usize,
    pub launch_delay: Duration,
    pub pacing: Pacing,
    pub request_timeout: Duration,
    pub template_file: Option<PathBuf>,
    pub skip_tls_verify: bool,
    pub resolve_target_addr: Option<String>,
    pub custom_headers: Option<String>,
    pub metrics_port: Option<u16>,
    pub output: OutputMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            order_count: DEFAULT_ORDER_COUNT,
            launch_delay: DEFAULT_LAUNCH_DELAY,
            pacing: Pacing::Fixed,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            template_file: None,
            skip_tls_verify: false,
            resolve_target_addr: None,
            custom_headers: None,
            metrics_port: None,
            output: OutputMode::Console,
        }
    }
}

fn env_string(var: &'static str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(var) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                var,
                value: raw.clone(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn env_duration(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    match env_string(var) {
        Some(raw) => parse_duration_string(&raw)
            .map(Some)
            .map_err(|message| ConfigError::InvalidValue {
                var,
                value: raw,
                message,
            }),
        None => Ok(None),
    }
}

impl Config {
    /// Loads configuration from `CONFIG_FILE` (if set) and the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match env_string("CONFIG_FILE") {
            Some(path) => Self::from_yaml(&YamlConfig::from_file(path)?)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from a YAML document, filling gaps with defaults.
    pub fn from_yaml(yaml: &YamlConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            target_url: yaml.target.clone().unwrap_or(defaults.target_url),
            order_count: yaml.orders.unwrap_or(defaults.order_count),
            launch_delay: match yaml.launch_delay {
                Some(ref d) => d.to_std_duration()?,
                None => defaults.launch_delay,
            },
            pacing: yaml.pacing.unwrap_or(defaults.pacing),
            request_timeout: match yaml.timeout {
                Some(ref d) => d.to_std_duration()?,
                None => defaults.request_timeout,
            },
            template_file: yaml.template_file.as_ref().map(PathBuf::from),
            skip_tls_verify: yaml.skip_tls_verify,
            resolve_target_addr: yaml.resolve_target_addr.clone(),
            custom_headers: yaml.custom_headers.clone(),
            metrics_port: yaml.metrics_port,
            output: yaml.output.unwrap_or(defaults.output),
        })
    }

    /// Environment variables win over whatever is already set.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = env_string("TARGET_URL") {
            self.target_url = url;
        }
        if let Some(count) = env_parsed::<usize>("ORDER_COUNT")? {
            self.order_count = count;
        }
        if let Some(delay) = env_duration("LAUNCH_DELAY")? {
            self.launch_delay = delay;
        }
        if let Some(pacing) = env_parsed::<Pacing>("PACING")? {
            self.pacing = pacing;
        }
        if let Some(timeout) = env_duration("REQUEST_TIMEOUT")? {
            self.request_timeout = timeout;
        }
        if let Some(path) = env_string("TEMPLATE_FILE") {
            self.template_file = Some(PathBuf::from(path));
        }
        if let Some(headers) = env_string("CUSTOM_HEADERS") {
            self.custom_headers = Some(headers);
        }
        if let Some(resolve) = env_string("RESOLVE_TARGET_ADDR") {
            self.resolve_target_addr = Some(resolve);
        }
        if let Some(skip) = env_string("SKIP_TLS_VERIFY") {
            self.skip_tls_verify = skip.trim().eq_ignore_ascii_case("true");
        }
        if let Some(port) = env_parsed::<u16>("METRICS_PORT")? {
            self.metrics_port = Some(port);
        }
        if let Some(output) = env_parsed::<OutputMode>("OUTPUT")? {
            self.output = output;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.target_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Validation("target URL cannot be empty".to_string()));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "target URL must start with http:// or https://, got: {}",
                url
            )));
        }
        if url.contains(' ') {
            return Err(ConfigError::Validation(
                "target URL cannot contain spaces".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads the order template: the configured file, or the built-in order.
    pub fn load_template(&self) -> Result<OrderPayload, TemplateError> {
        match self.template_file {
            Some(ref path) => OrderPayload::from_json_file(path),
            None => Ok(OrderPayload::canonical()),
        }
    }

    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: self.request_timeout,
            skip_tls_verify: self.skip_tls_verify,
            resolve_target_addr: self.resolve_target_addr.clone(),
            custom_headers: self.custom_headers.clone(),
            ..ClientConfig::default()
        }
    }

    pub fn to_dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            total_units: self.order_count,
            target_url: self.target_url.clone(),
            launch_delay: self.launch_delay,
            pacing: self.pacing,
        }
    }

    /// Prints the configuration summary.
    pub fn print_summary(&self, parsed_headers: &reqwest::header::HeaderMap) {
        println!("Starting order load generator:");
        println!("  Target URL: {}", self.target_url);
        println!("  Orders: {}", self.order_count);
        println!("  Launch Delay: {:?} ({} pacing)", self.launch_delay, self.pacing);
        println!("  Request Timeout: {:?}", self.request_timeout);
        match self.template_file {
            Some(ref path) => println!("  Template: {}", path.display()),
            None => println!("  Template: built-in"),
        }
        println!("  Skip TLS Verify: {}", self.skip_tls_verify);
        if parsed_headers.is_empty() {
            println!("  Custom Headers Enabled: No");
        } else {
            println!("  Custom Headers Enabled: Yes");
            for (name, value) in parsed_headers.iter() {
                println!(
                    "    {}: {}",
                    name,
                    value.to_str().unwrap_or("<non-ASCII or sensitive value>")
                );
            }
        }
        match self.metrics_port {
            Some(port) => println!("  Metrics: http://0.0.0.0:{}/metrics", port),
            None => println!("  Metrics: disabled"),
        }
        println!("  Output: {}", self.output);
    }
}
