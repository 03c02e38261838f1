//! Metric sources.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::reading::ValidationError;

/// Error type for sampling operations.
#[derive(Debug, Error)]
pub enum SampleError {
    /// The underlying counters could not be read.
    #[error("Metric source unavailable: {0}")]
    Unavailable(#[from] io::Error),

    /// The counters were read but not understood.
    #[error("Failed to parse metric source: {0}")]
    Parse(String),

    /// The sampled value could not form a reading.
    #[error("Sampled value rejected: {0}")]
    InvalidReading(#[from] ValidationError),
}

/// Something that produces one numeric metric per call.
///
/// Sources may keep state between calls (for example to compute a rate from
/// monotonic counters), hence `&mut self`.
pub trait MetricSource: Send {
    /// Takes one sample.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError`] if the metric cannot be read or parsed.
    fn sample(&mut self) -> Result<f64, SampleError>;
}

/// Aggregate CPU time counters from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    /// Ticks spent doing work.
    pub busy: u64,
    /// Ticks spent idle, including waiting on I/O.
    pub idle: u64,
}

impl CpuTimes {
    /// Total ticks.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.busy + self.idle
    }

    /// Parses the aggregate `cpu` line from the contents of `/proc/stat`.
    ///
    /// Columns are `user nice system idle iowait irq softirq steal ...`;
    /// `idle` and `iowait` count as idle, everything else as busy. Guest
    /// columns are already included in `user`/`nice` and are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::Parse`] if there is no aggregate line, it has
    /// fewer than four numeric columns, or the counters overflow.
    pub fn parse(stat: &str) -> Result<Self, SampleError> {
        let rest = stat
            .lines()
            .find_map(|line| line.strip_prefix("cpu "))
            .ok_or_else(|| SampleError::Parse("no aggregate cpu line".to_string()))?;

        let columns = rest
            .split_whitespace()
            .take(8)
            .map(str::parse::<u64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SampleError::Parse(format!("bad cpu column: {e}")))?;

        if columns.len() < 4 {
            return Err(SampleError::Parse(format!(
                "expected at least 4 cpu columns, found {}",
                columns.len()
            )));
        }

        let overflow = || SampleError::Parse("cpu counters overflow u64".to_string());
        let idle = columns[3]
            .checked_add(columns.get(4).copied().unwrap_or(0))
            .ok_or_else(overflow)?;
        let total = columns
            .iter()
            .try_fold(0u64, |sum, &column| sum.checked_add(column))
            .ok_or_else(overflow)?;

        // idle is a subset of the summed columns
        Ok(Self {
            busy: total - idle,
            idle,
        })
    }

    /// Utilisation in percent between `earlier` and `self`, rounded to one
    /// decimal place. Zero elapsed ticks yield `0.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilisation_since(&self, earlier: &Self) -> f64 {
        let total = self.total().saturating_sub(earlier.total());
        if total == 0 {
            return 0.0;
        }
        let busy = self.busy.saturating_sub(earlier.busy);
        let percent = 100.0 * busy as f64 / total as f64;
        (percent * 10.0).round() / 10.0
    }
}

/// CPU utilisation read from procfs.
///
/// The first sample measures utilisation since boot; later samples measure
/// the interval since the previous call.
#[derive(Debug, Clone)]
pub struct ProcStatSource {
    path: PathBuf,
    previous: CpuTimes,
}

impl ProcStatSource {
    /// Default counters location.
    pub const DEFAULT_PATH: &'static str = "/proc/stat";

    /// Creates a source reading [`Self::DEFAULT_PATH`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_path(Self::DEFAULT_PATH)
    }

    /// Creates a source reading an alternative stat file.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            previous: CpuTimes::default(),
        }
    }

    /// The stat file this source reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ProcStatSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for ProcStatSource {
    fn sample(&mut self) -> Result<f64, SampleError> {
        let raw = std::fs::read_to_string(&self.path)?;
        let current = CpuTimes::parse(&raw)?;
        let percent = current.utilisation_since(&self.previous);
        self.previous = current;
        Ok(percent)
    }
}
