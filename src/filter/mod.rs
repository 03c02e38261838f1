//! Change detection over per-device readings.
//!
//! This module provides:
//! - The per-device baseline cache ([`FilterState`], [`Transition`])
//! - The forward/suppress decision ([`ChangeFilter`], [`ForwardDecision`])
//!
//! # State Machine
//!
//! Per device: `Unseen -> Seen(v)` on the first reading, `Seen(v) -> Seen(v')`
//! on every committed change. Suppressed readings cause no transition.

mod change;
mod state;

#[cfg(test)]
mod change_tests;

pub use change::{ChangeFilter, EPSILON, ForwardDecision};
pub use state::{FilterState, Transition};
