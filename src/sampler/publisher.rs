//! Periodic reading publisher.

use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};

use super::{MetricSource, SampleError};
use crate::bus::{BusMessage, LocalBus};
use crate::reading::DeviceReading;
use crate::time::{Clock, SystemClock};

/// Samples a [`MetricSource`] on a fixed interval and publishes each reading
/// onto a bus topic as a JSON message.
pub struct Publisher<S, C = SystemClock> {
    source: S,
    clock: C,
    bus: LocalBus,
    topic: String,
    device_name: String,
    interval: Duration,
}

impl<S: MetricSource> Publisher<S> {
    /// Default sampling interval.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    /// Creates a publisher using the system clock and the default interval.
    pub fn new(
        source: S,
        bus: LocalBus,
        topic: impl Into<String>,
        device_name: impl Into<String>,
    ) -> Self {
        Self {
            source,
            clock: SystemClock,
            bus,
            topic: topic.into(),
            device_name: device_name.into(),
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}

impl<S: MetricSource, C: Clock> Publisher<S, C> {
    /// Replaces the clock used for reading timestamps.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Publisher<S, C2> {
        Publisher {
            source: self.source,
            clock,
            bus: self.bus,
            topic: self.topic,
            device_name: self.device_name,
            interval: self.interval,
        }
    }

    /// Sets the time between samples.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "publish interval must be non-zero");
        self.interval = interval;
        self
    }

    /// Time between samples.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Samples the source once and builds a reading.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError`] if sampling fails or the result cannot form a
    /// valid reading.
    pub fn next_reading(&mut self) -> Result<DeviceReading, SampleError> {
        let value = self.source.sample()?;
        let reading = DeviceReading::new(&*self.device_name, value, self.clock.timestamp())?;
        Ok(reading)
    }

    /// Samples once and publishes the result.
    ///
    /// Returns how many subscribers received the reading. Failures are
    /// logged and yield zero.
    pub fn publish_once(&mut self) -> usize {
        let reading = match self.next_reading() {
            Ok(reading) => reading,
            Err(e) => {
                tracing::warn!("Skipping sample: {e}");
                return 0;
            }
        };

        let payload = match reading.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to serialize {reading}: {e}");
                return 0;
            }
        };

        match self.bus.publish(&self.topic, BusMessage::Json(payload)) {
            Ok(reached) => {
                tracing::debug!("Published {reading} to {} subscriber(s)", reached);
                reached
            }
            Err(e) => {
                tracing::warn!("Failed to publish {reading}: {e}");
                0
            }
        }
    }

    /// Publishes on every interval tick until the future is dropped.
    ///
    /// The first sample is taken immediately.
    pub async fn run(mut self) {
        tracing::info!(
            "Publishing {} readings to {} every {:?}",
            self.device_name,
            self.topic,
            self.interval
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.publish_once();
        }
    }
}
