//! Local metric sampling.
//!
//! This module provides:
//! - The sampling abstraction ([`MetricSource`], [`SampleError`])
//! - A Linux CPU utilisation source ([`ProcStatSource`])
//! - A periodic publisher feeding readings onto the bus ([`Publisher`])

mod publisher;
mod source;


pub use publisher::Publisher;
pub use source::{CpuTimes, MetricSource, ProcStatSource, SampleError};
