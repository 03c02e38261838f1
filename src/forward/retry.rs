//! Backoff policy for forward attempts.

use std::time::Duration;

/// Exponential backoff applied when a forward attempt fails transiently.
///
/// # Defaults
///
/// - `max_attempts`: 3
/// - `initial_delay`: 1 second
/// - `max_delay`: 10 seconds
/// - `multiplier`: 2.0
///
/// # Example
///
/// ```
/// use telemetry_relay::forward::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new()
///     .with_max_attempts(4)
///     .with_initial_delay(Duration::from_millis(250));
/// assert_eq!(policy.delay_for_retry(1), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 1 disables retries.
    pub max_attempts: u32,

    /// Wait before the first retry.
    pub initial_delay: Duration,

    /// Upper bound on any single wait.
    pub max_delay: Duration,

    /// Growth factor between consecutive waits.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Default maximum attempts.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Default initial delay.
    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

    /// Default maximum delay.
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

    /// Default multiplier.
    pub const DEFAULT_MULTIPLIER: f64 = 2.0;

    /// Creates a policy with the default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            initial_delay: Self::DEFAULT_INITIAL_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
            multiplier: Self::DEFAULT_MULTIPLIER,
        }
    }

    /// Policy that makes a single attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::new().with_max_attempts(1)
    }

    /// Sets the total number of attempts.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is zero.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        assert!(max_attempts >= 1, "max_attempts must be at least 1");
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the wait before the first retry.
    ///
    /// Zero is accepted for tests; it produces a tight retry loop in
    /// production.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the cap on any single wait.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor.
    ///
    /// # Panics
    ///
    /// Panics unless `multiplier` is positive and finite.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        assert!(
            multiplier > 0.0 && multiplier.is_finite(),
            "multiplier must be positive"
        );
        self.multiplier = multiplier;
        self
    }

    /// Wait before retry number `retry` (0 = before the first retry), capped
    /// at `max_delay`.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Returns true if another attempt may follow attempt number `attempt`
    /// (1-based).
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}
