//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use url::Url;

use crate::bus::validate_topic;
use crate::forward::RetryPolicy;

use super::cli::Cli;
use super::defaults;
use super::error::{ConfigError, field};
use super::toml::TomlConfig;

/// Fully validated configuration ready for use by the application.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
/// The function validates all inputs and returns errors for invalid configurations.
#[derive(Debug)]
pub struct ValidatedConfig {
    /// Remote endpoint URL (required)
    pub url: Url,

    /// HTTP method for forward requests
    pub method: Method,

    /// HTTP headers for forward requests
    pub headers: HeaderMap,

    /// Per-attempt forward timeout
    pub forward_timeout: Duration,

    /// Bus topic carrying device readings
    pub topic: String,

    /// UDP ingress address; `None` disables the ingress
    pub listen: Option<SocketAddr>,

    /// Per-topic bus buffer size
    pub bus_capacity: usize,

    /// Device name used by the local publisher
    pub device_name: String,

    /// Local publisher interval
    pub publish_interval: Duration,

    /// Whether the local publisher is disabled
    pub publish_disabled: bool,

    /// Change-detection tolerance
    pub tolerance: f64,

    /// Retry policy for failed forwards
    pub retry_policy: RetryPolicy,

    /// Dry-run mode (log readings without contacting the endpoint)
    pub dry_run: bool,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listen_str = self
            .listen
            .map_or_else(|| "off".to_string(), |addr| addr.to_string());
        let publisher_str = if self.publish_disabled {
            "off".to_string()
        } else {
            format!(
                "{}/{}s",
                self.device_name,
                self.publish_interval.as_secs()
            )
        };

        write!(
            f,
            "Config {{ url: {}, method: {}, timeout: {}s, topic: {}, listen: {}, \
             publisher: {}, tolerance: {}, retry: {}x/{}s, dry_run: {} }}",
            self.url,
            self.method,
            self.forward_timeout.as_secs(),
            self.topic,
            listen_str,
            publisher_str,
            self.tolerance,
            self.retry_policy.max_attempts,
            self.retry_policy.initial_delay.as_secs(),
            self.dry_run,
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The endpoint URL is missing or invalid
    /// - Header, method, topic or listen address values are invalid
    /// - Duration values are zero
    /// - Tolerance, capacity or retry settings are out of range
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let url = Self::resolve_url(cli, toml)?;
        let method = Self::resolve_method(cli, toml)?;
        let headers = Self::resolve_headers(cli, toml)?;

        let forward_timeout = resolve_seconds(
            field::FORWARD_TIMEOUT,
            cli.forward_timeout
                .or_else(|| toml.and_then(|t| t.endpoint.timeout)),
            defaults::FORWARD_TIMEOUT_SECS,
        )?;

        let topic = Self::resolve_topic(cli, toml)?;
        let listen = Self::resolve_listen(cli, toml)?;
        let bus_capacity = Self::resolve_bus_capacity(toml)?;

        let device_name = Self::resolve_device_name(cli, toml)?;
        let publish_interval = resolve_seconds(
            field::PUBLISH_INTERVAL,
            cli.publish_interval
                .or_else(|| toml.and_then(|t| t.publisher.interval)),
            defaults::PUBLISH_INTERVAL_SECS,
        )?;
        // Flags only enable
        let publish_disabled = cli.no_publish || toml.is_some_and(|t| t.publisher.disabled);

        let tolerance = Self::resolve_tolerance(cli, toml)?;
        let retry_policy = Self::build_retry_policy(cli, toml)?;

        Ok(Self {
            url,
            method,
            headers,
            forward_timeout,
            topic,
            listen,
            bus_capacity,
            device_name,
            publish_interval,
            publish_disabled,
            tolerance,
            retry_policy,
            dry_run: cli.dry_run,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(path)?)
        } else {
            None
        };

        Self::from_raw(cli, toml.as_ref())
    }

    fn resolve_url(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Url, ConfigError> {
        let url_str = cli
            .endpoint
            .as_deref()
            .or_else(|| toml.and_then(|t| t.endpoint.url.as_deref()))
            .ok_or_else(|| {
                ConfigError::missing(
                    field::URL,
                    "Use --endpoint or set endpoint.url in config file",
                )
            })?;

        let url = Url::parse(url_str).map_err(|e| ConfigError::InvalidUrl {
            url: url_str.to_string(),
            reason: e.to_string(),
        })?;

        if matches!(url.scheme(), "http" | "https") {
            return Ok(url);
        }

        Err(ConfigError::InvalidUrl {
            url: url_str.to_string(),
            reason: format!(
                "unsupported scheme '{}', expected http or https",
                url.scheme()
            ),
        })
    }

    fn resolve_method(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Method, ConfigError> {
        // Priority: CLI explicit > TOML > default
        let method_str = cli
            .method
            .as_deref()
            .or_else(|| toml.and_then(|t| t.endpoint.method.as_deref()))
            .unwrap_or(defaults::METHOD);

        method_str
            .parse::<Method>()
            .map_err(|_| ConfigError::InvalidMethod(method_str.to_string()))
    }

    fn resolve_headers(cli: &Cli, toml: Option<&TomlConfig>) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::new();

        // TOML first so CLI can override
        if let Some(toml) = toml {
            for (name, value) in &toml.endpoint.headers {
                let header_name = parse_header_name(name)?;
                let header_value = parse_header_value(name, value)?;
                headers.insert(header_name, header_value);
            }
        }

        for header_str in &cli.headers {
            let (name, value) = parse_header_string(header_str)?;
            let header_name = parse_header_name(&name)?;
            let header_value = parse_header_value(&name, &value)?;
            headers.insert(header_name, header_value);
        }

        let bearer = cli
            .bearer
            .as_deref()
            .or_else(|| toml.and_then(|t| t.endpoint.bearer.as_deref()));

        if let Some(token) = bearer {
            let auth_value = format!("Bearer {token}");
            let header_value = parse_header_value("Authorization", &auth_value)?;
            headers.insert(AUTHORIZATION, header_value);
        }

        Ok(headers)
    }

    fn resolve_topic(cli: &Cli, toml: Option<&TomlConfig>) -> Result<String, ConfigError> {
        let topic = cli
            .topic
            .as_deref()
            .or_else(|| toml.and_then(|t| t.bus.topic.as_deref()))
            .unwrap_or(defaults::TOPIC);

        validate_topic(topic).map_err(ConfigError::InvalidTopic)?;

        Ok(topic.to_string())
    }

    fn resolve_listen(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Option<SocketAddr>, ConfigError> {
        if let Some(addr) = cli.listen {
            return Ok(Some(addr));
        }

        toml.and_then(|t| t.bus.listen.as_deref())
            .map(|value| {
                value
                    .parse::<SocketAddr>()
                    .map_err(|e| ConfigError::InvalidListen {
                        value: value.to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()
    }

    fn resolve_bus_capacity(toml: Option<&TomlConfig>) -> Result<usize, ConfigError> {
        let capacity = toml
            .and_then(|t| t.bus.capacity)
            .unwrap_or(defaults::BUS_CAPACITY);

        if capacity == 0 {
            return Err(ConfigError::invalid(
                field::BUS_CAPACITY,
                "must be greater than 0",
            ));
        }

        Ok(capacity)
    }

    fn resolve_device_name(cli: &Cli, toml: Option<&TomlConfig>) -> Result<String, ConfigError> {
        let name = cli
            .device_name
            .as_deref()
            .or_else(|| toml.and_then(|t| t.publisher.device_name.as_deref()))
            .unwrap_or(defaults::DEVICE_NAME)
            .trim();

        if name.is_empty() {
            return Err(ConfigError::invalid(field::DEVICE_NAME, "must not be empty"));
        }

        Ok(name.to_string())
    }

    fn resolve_tolerance(cli: &Cli, toml: Option<&TomlConfig>) -> Result<f64, ConfigError> {
        let tolerance = cli
            .tolerance
            .or_else(|| toml.and_then(|t| t.filter.tolerance))
            .unwrap_or(defaults::TOLERANCE);

        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::invalid(
                field::TOLERANCE,
                format!("{tolerance} must be a non-negative finite number"),
            ));
        }

        Ok(tolerance)
    }

    fn build_retry_policy(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<RetryPolicy, ConfigError> {
        let retry = toml.map(|t| &t.retry);

        // Priority: CLI explicit > TOML > default
        let max_attempts = cli
            .retry_max
            .or_else(|| retry.and_then(|r| r.max_attempts))
            .unwrap_or(defaults::RETRY_MAX_ATTEMPTS);

        let initial_delay_secs = cli
            .retry_delay
            .or_else(|| retry.and_then(|r| r.initial_delay))
            .unwrap_or(defaults::RETRY_INITIAL_DELAY_SECS);

        let max_delay_secs = retry
            .and_then(|r| r.max_delay)
            .unwrap_or(defaults::RETRY_MAX_DELAY_SECS);

        let multiplier = retry
            .and_then(|r| r.multiplier)
            .unwrap_or(defaults::RETRY_MULTIPLIER);

        if max_attempts == 0 {
            return Err(ConfigError::InvalidRetry(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if initial_delay_secs == 0 {
            return Err(ConfigError::InvalidRetry(
                "initial_delay must be greater than 0".to_string(),
            ));
        }

        if multiplier <= 0.0 || !multiplier.is_finite() {
            return Err(ConfigError::InvalidRetry(
                "multiplier must be a positive finite number".to_string(),
            ));
        }

        if max_delay_secs < initial_delay_secs {
            return Err(ConfigError::InvalidRetry(format!(
                "max_delay ({max_delay_secs}s) must be >= initial_delay ({initial_delay_secs}s)"
            )));
        }

        Ok(RetryPolicy::new()
            .with_max_attempts(max_attempts)
            .with_initial_delay(Duration::from_secs(initial_delay_secs))
            .with_max_delay(Duration::from_secs(max_delay_secs))
            .with_multiplier(multiplier))
    }
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

// Helper functions

fn resolve_seconds(
    field: &'static str,
    value: Option<u64>,
    default: u64,
) -> Result<Duration, ConfigError> {
    let seconds = value.unwrap_or(default);

    if seconds == 0 {
        return Err(ConfigError::InvalidDuration {
            field,
            reason: "must be greater than 0".to_string(),
        });
    }

    Ok(Duration::from_secs(seconds))
}

fn parse_header_string(s: &str) -> Result<(String, String), ConfigError> {
    if let Some((name, value)) = s.split_once('=') {
        return Ok((name.trim().to_string(), value.trim().to_string()));
    }

    if let Some((name, value)) = s.split_once(':') {
        return Ok((name.trim().to_string(), value.trim().to_string()));
    }

    Err(ConfigError::InvalidHeader {
        value: s.to_string(),
    })
}

fn parse_header_name(name: &str) -> Result<HeaderName, ConfigError> {
    name.parse::<HeaderName>()
        .map_err(|e| ConfigError::InvalidHeaderName {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeaderValue {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
