//! Per-device last-forwarded-value cache.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Outcome of offering a value to [`FilterState::commit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// The device had no entry; the value is now its baseline.
    First,
    /// The value moved beyond tolerance and replaced the baseline.
    Changed {
        /// Baseline before this commit
        previous: f64,
    },
    /// The value is within tolerance of the baseline; nothing changed.
    Unchanged {
        /// Current baseline
        previous: f64,
    },
}

impl Transition {
    /// Returns true if the value was committed as the new baseline.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::First | Self::Changed { .. })
    }
}

/// Mapping from device name to the last metric value committed for forwarding.
///
/// A device is present if and only if at least one of its readings has been
/// committed. Entries are never removed.
///
/// # Concurrency
///
/// Entries live in a sharded map. [`commit`](Self::commit) performs the
/// compare and the write under the shard guard for that device, so two
/// concurrent commits for one device can never both observe the same
/// baseline. Commits for devices on different shards proceed in parallel,
/// and no guard outlives a single `commit` call.
#[derive(Debug, Default)]
pub struct FilterState {
    last_value_by_device: DashMap<String, f64>,
}

impl FilterState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last committed value for `device`, if any.
    #[must_use]
    pub fn last_value(&self, device: &str) -> Option<f64> {
        self.last_value_by_device.get(device).map(|v| *v)
    }

    /// Returns the number of devices with a baseline.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_value_by_device.len()
    }

    /// Returns true if no device has a baseline yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_value_by_device.is_empty()
    }

    /// Atomically compares `value` against the baseline for `device` and
    /// commits it when it is new or differs by more than `tolerance`.
    ///
    /// The suppressed path does not allocate.
    pub fn commit(&self, device: &str, value: f64, tolerance: f64) -> Transition {
        if let Some(mut baseline) = self.last_value_by_device.get_mut(device) {
            return apply(&mut baseline, value, tolerance);
        }

        // Another caller may have inserted between the two lookups; the entry
        // guard settles it.
        match self.last_value_by_device.entry(device.to_owned()) {
            Entry::Occupied(mut entry) => apply(entry.get_mut(), value, tolerance),
            Entry::Vacant(entry) => {
                entry.insert(value);
                Transition::First
            }
        }
    }
}

fn apply(baseline: &mut f64, value: f64, tolerance: f64) -> Transition {
    let previous = *baseline;
    if (previous - value).abs() > tolerance {
        *baseline = value;
        Transition::Changed { previous }
    } else {
        Transition::Unchanged { previous }
    }
}
