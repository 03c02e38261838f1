//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

use std::time::Duration;

/// Default HTTP method for forward requests.
pub const METHOD: &str = "POST";

/// Default per-attempt forward timeout in seconds.
pub const FORWARD_TIMEOUT_SECS: u64 = 5;

/// Default bus topic carrying device readings.
pub const TOPIC: &str = "iot/metrics/cpu";

/// Default per-topic bus buffer size.
pub const BUS_CAPACITY: usize = 256;

/// Default device name used by the local publisher.
pub const DEVICE_NAME: &str = "local-device";

/// Default publisher sampling interval in seconds.
pub const PUBLISH_INTERVAL_SECS: u64 = 2;

/// Default change-detection tolerance.
pub const TOLERANCE: f64 = crate::filter::EPSILON;

/// Default maximum number of forward attempts.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default initial retry delay in seconds.
pub const RETRY_INITIAL_DELAY_SECS: u64 = 1;

/// Default maximum retry delay in seconds.
pub const RETRY_MAX_DELAY_SECS: u64 = 10;

/// Default retry backoff multiplier.
pub const RETRY_MULTIPLIER: f64 = 2.0;

/// Default forward timeout as Duration.
#[must_use]
pub const fn forward_timeout() -> Duration {
    Duration::from_secs(FORWARD_TIMEOUT_SECS)
}

/// Default publisher interval as Duration.
#[must_use]
pub const fn publish_interval() -> Duration {
    Duration::from_secs(PUBLISH_INTERVAL_SECS)
}
