//! Time abstractions for testability.
//!
//! - [`Clock`] supplies wall-clock timestamps for sampled readings.
//! - [`Sleeper`] supplies the waits between forward retries.

use std::time::{Duration, SystemTime};

use chrono::{DateTime, SecondsFormat, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;

    /// Returns the current time as an RFC 3339 UTC token, e.g.
    /// `2024-05-01T10:00:00.123456Z`.
    fn timestamp(&self) -> String {
        DateTime::<Utc>::from(self.now()).to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

/// [`Clock`] backed by [`SystemTime::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Asynchronous delay.
pub trait Sleeper: Send + Sync {
    /// Waits for `duration`.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// [`Sleeper`] that returns immediately. Used in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    async fn sleep(&self, _duration: Duration) {}
}
