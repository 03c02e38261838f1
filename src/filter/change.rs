//! Change-detection filter.

use crate::forward::Forwarder;
use crate::reading::DeviceReading;

use super::{FilterState, Transition};

/// Default tolerance below which two readings are considered equal.
///
/// Absorbs floating-point noise in the sampled metric; a delta equal to the
/// tolerance is still suppressed.
pub const EPSILON: f64 = 0.01;

/// Result of handling one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForwardDecision {
    /// The reading was a change and the forwarder accepted it.
    Forwarded,
    /// The reading was within tolerance of the baseline.
    Suppressed,
    /// The reading was a change and committed as the new baseline, but the
    /// forwarder reported an error or timed out.
    ForwardFailed,
}

impl ForwardDecision {
    /// Returns true if the reading was committed as the device's baseline.
    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(self, Self::Forwarded | Self::ForwardFailed)
    }
}

/// Decides whether readings are material changes and forwards those that are.
///
/// # Forwarding Policy
///
/// The baseline is committed before the forwarder is invoked and is never
/// rolled back. A failed forward therefore does not cause the same value to be
/// re-sent on the next unchanged reading; delivery guarantees belong to the
/// forwarder's own retry layer.
///
/// # Type Parameters
///
/// * `F` - The [`Forwarder`] that delivers committed readings
#[derive(Debug)]
pub struct ChangeFilter<F> {
    state: FilterState,
    forwarder: F,
    tolerance: f64,
}

impl<F> ChangeFilter<F> {
    /// Creates a filter over the given state with the default tolerance.
    #[must_use]
    pub const fn new(state: FilterState, forwarder: F) -> Self {
        Self {
            state,
            forwarder,
            tolerance: EPSILON,
        }
    }

    /// Sets the change tolerance.
    ///
    /// # Panics
    ///
    /// Panics if `tolerance` is negative or not finite.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        assert!(
            tolerance.is_finite() && tolerance >= 0.0,
            "tolerance must be a non-negative finite number"
        );
        self.tolerance = tolerance;
        self
    }

    /// Returns the configured tolerance.
    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Returns read access to the filter state.
    #[must_use]
    pub const fn state(&self) -> &FilterState {
        &self.state
    }

    /// Returns the forwarder.
    #[must_use]
    pub const fn forwarder(&self) -> &F {
        &self.forwarder
    }
}

impl<F: Forwarder> ChangeFilter<F> {
    /// Handles one validated reading.
    ///
    /// The decision and the baseline update happen under the device's entry
    /// guard; the guard is released before the forwarder is awaited, so a slow
    /// forward never blocks other devices.
    pub async fn handle(&self, reading: &DeviceReading) -> ForwardDecision {
        let device = reading.device_name();
        let value = reading.metric_value();

        match self.state.commit(device, value, self.tolerance) {
            Transition::Unchanged { previous } => {
                tracing::debug!("No significant change for {device} ({previous} ~ {value}), ignoring");
                return ForwardDecision::Suppressed;
            }
            Transition::First => {
                tracing::info!("First reading for {device}: {value}");
            }
            Transition::Changed { previous } => {
                tracing::info!("Value changed for {device}: {previous} -> {value}");
            }
        }

        match self.forwarder.forward(reading).await {
            Ok(()) => {
                tracing::info!("Forwarded reading for {device}");
                ForwardDecision::Forwarded
            }
            Err(e) => {
                tracing::error!("Forward failed for {device}, baseline kept at {value}: {e}");
                ForwardDecision::ForwardFailed
            }
        }
    }
}
