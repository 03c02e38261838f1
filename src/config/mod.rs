//! Configuration layer for the telemetry relay.
//!
//! This module provides:
//! - CLI argument parsing ([`Cli`], [`Command`])
//! - TOML configuration file parsing ([`TomlConfig`])
//! - Validated configuration ([`ValidatedConfig`])
//! - Configuration file generation ([`write_default_config`])
//! - Default values ([`defaults`])
//!
//! # Priority
//!
//! Configuration values are resolved with the following priority (highest to lowest):
//!
//! 1. **Explicit CLI arguments** - Values explicitly passed via command line
//! 2. **TOML config file** - Values from the configuration file
//! 3. **Built-in defaults** - Hardcoded default values
//!
//! The endpoint URL has no default and must come from `--endpoint` or
//! `endpoint.url`.
//!
//! Headers are merged: TOML headers are applied first, then CLI headers
//! override entries with the same name. A bearer token always sets
//! `Authorization`.
//!
//! # Boolean Flag Semantics
//!
//! `--no-publish` uses OR semantics with `publisher.disabled`: once either
//! source disables the publisher, the other cannot re-enable it.
//!
//! # TOML-Only Options
//!
//! - `bus.capacity` (default: 256) - Per-topic buffer size
//! - `retry.max_delay` (default: 10s) - Maximum retry delay
//! - `retry.multiplier` (default: 2.0) - Exponential backoff multiplier

mod cli;
pub mod defaults;
mod error;
mod toml;
mod validated;

#[cfg(test)]
mod validated_tests;

pub use cli::{Cli, Command};
pub use error::{ConfigError, field};
pub use toml::{TomlConfig, default_config_template};
pub use validated::{ValidatedConfig, write_default_config};
