//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Remote endpoint section
    #[serde(default)]
    pub endpoint: EndpointSection,

    /// Local bus section
    #[serde(default)]
    pub bus: BusSection,

    /// Local publisher section
    #[serde(default)]
    pub publisher: PublisherSection,

    /// Change-detection section
    #[serde(default)]
    pub filter: FilterSection,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetrySection,
}

/// Remote endpoint configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSection {
    /// Endpoint URL
    pub url: Option<String>,

    /// HTTP method (default: POST)
    pub method: Option<String>,

    /// HTTP headers as key-value pairs
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Bearer token for Authorization header
    pub bearer: Option<String>,

    /// Per-attempt timeout in seconds
    pub timeout: Option<u64>,
}

/// Local bus configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusSection {
    /// Topic carrying device readings
    pub topic: Option<String>,

    /// UDP ingress address
    pub listen: Option<String>,

    /// Per-topic buffer size
    pub capacity: Option<usize>,
}

/// Local publisher configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublisherSection {
    /// Device name attached to published readings
    pub device_name: Option<String>,

    /// Sampling interval in seconds
    pub interval: Option<u64>,

    /// Disable the publisher
    #[serde(default)]
    pub disabled: bool,
}

/// Change-detection configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSection {
    /// Minimum change that counts as a new value
    pub tolerance: Option<f64>,
}

/// Retry policy configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    /// Maximum number of forward attempts
    pub max_attempts: Option<u32>,

    /// Initial retry delay in seconds
    pub initial_delay: Option<u64>,

    /// Maximum retry delay in seconds
    pub max_delay: Option<u64>,

    /// Backoff multiplier
    pub multiplier: Option<f64>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# Telemetry Relay Configuration File

[endpoint]
# Remote ingestion endpoint (required)
# url = "https://ingest.example.com/metrics"

# HTTP method (default: POST, can be overridden by --method CLI flag)
# method = "POST"

# Per-attempt timeout in seconds (default: 5)
# timeout = 5

# HTTP headers
# [endpoint.headers]
# X-Api-Key = "value"

# Bearer token for Authorization header
# bearer = "your-token-here"

[bus]
# Topic carrying device readings (default: iot/metrics/cpu)
topic = "iot/metrics/cpu"

# Accept JSON readings as UDP datagrams on this address (default: off)
# listen = "127.0.0.1:7878"

# Per-topic buffer size (default: 256)
# capacity = 256

[publisher]
# Device name attached to locally sampled CPU readings
device_name = "local-device"

# Sampling interval in seconds (default: 2)
interval = 2

# Disable the local CPU publisher
# disabled = false

[filter]
# Readings within this distance of the last forwarded value are suppressed
# tolerance = 0.01

[retry]
# Maximum number of forward attempts (default: 3)
# max_attempts = 3

# Initial retry delay in seconds (default: 1)
# initial_delay = 1

# Maximum retry delay in seconds (default: 10)
# max_delay = 10

# Backoff multiplier (default: 2.0)
# multiplier = 2.0
"#
    .to_string()
}
