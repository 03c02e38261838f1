//! Error types for configuration parsing and validation.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for configuration operations.
///
/// Covers errors from parsing, validation, and file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file '{}': {source}", path.display())]
    FileRead {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to write configuration file (for init command).
    #[error("Failed to write config file '{}': {source}", path.display())]
    FileWrite {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Missing required field that must be provided by CLI or config file.
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired {
        /// Name of the missing field
        field: &'static str,
        /// Hint for how to provide the value
        hint: &'static str,
    },

    /// Invalid endpoint URL.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The invalid URL string
        url: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid duration value (zero or too large).
    #[error("Invalid duration for {field}: {reason}")]
    InvalidDuration {
        /// Name of the field
        field: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid retry configuration.
    #[error("Invalid retry configuration: {0}")]
    InvalidRetry(String),

    /// Invalid HTTP method.
    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    /// Invalid header format.
    #[error("Invalid header format '{value}': expected 'Key=Value' or 'Key: Value'")]
    InvalidHeader {
        /// The invalid header string
        value: String,
    },

    /// Invalid header name.
    #[error("Invalid header name '{name}': {reason}")]
    InvalidHeaderName {
        /// The invalid header name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid header value.
    #[error("Invalid header value for '{name}': {reason}")]
    InvalidHeaderValue {
        /// The header name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid bus topic name.
    #[error(transparent)]
    InvalidTopic(crate::bus::BusError),

    /// Invalid UDP listen address.
    #[error("Invalid listen address '{value}': {reason}")]
    InvalidListen {
        /// The rejected address string
        value: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Any other out-of-range value.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the field
        field: &'static str,
        /// Reason for invalidity
        reason: String,
    },
}

/// Well-known field names used in configuration errors.
///
/// Use these constants for compile-time safety when matching field names.
pub mod field {
    /// The endpoint URL field.
    pub const URL: &str = "url";
    /// The forward timeout field.
    pub const FORWARD_TIMEOUT: &str = "forward_timeout";
    /// The publisher interval field.
    pub const PUBLISH_INTERVAL: &str = "publish_interval";
    /// The publisher device name field.
    pub const DEVICE_NAME: &str = "device_name";
    /// The change-detection tolerance field.
    pub const TOLERANCE: &str = "tolerance";
    /// The bus capacity field.
    pub const BUS_CAPACITY: &str = "bus_capacity";
}

impl ConfigError {
    /// Creates a `MissingRequired` error for a required field.
    #[must_use]
    pub const fn missing(field: &'static str, hint: &'static str) -> Self {
        Self::MissingRequired { field, hint }
    }

    /// Creates an `InvalidValue` error.
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
