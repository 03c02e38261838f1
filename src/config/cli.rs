//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Telemetry relay
///
/// Subscribes to device readings on a local bus, suppresses readings that
/// have not changed materially, and forwards the rest to a remote endpoint.
#[derive(Debug, Parser)]
#[command(name = "telemetry-relay")]
#[command(version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)] // CLI flags are naturally boolean
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Remote ingestion endpoint URL (required for run mode)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// HTTP method for forward requests
    #[arg(long)]
    pub method: Option<String>,

    /// HTTP headers in 'Key=Value' or 'Key: Value' format (can be specified multiple times)
    #[arg(long = "header", value_name = "K=V")]
    pub headers: Vec<String>,

    /// Bearer token for Authorization header
    #[arg(long)]
    pub bearer: Option<String>,

    /// Per-attempt forward timeout in seconds
    #[arg(long = "forward-timeout")]
    pub forward_timeout: Option<u64>,

    /// Bus topic carrying device readings
    #[arg(long)]
    pub topic: Option<String>,

    /// Accept JSON readings as UDP datagrams on this address
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Device name used by the local CPU publisher
    #[arg(long = "device-name")]
    pub device_name: Option<String>,

    /// Local CPU publisher interval in seconds
    #[arg(long = "publish-interval")]
    pub publish_interval: Option<u64>,

    /// Disable the local CPU publisher
    #[arg(long = "no-publish")]
    pub no_publish: bool,

    /// Minimum change in the metric that counts as a new value
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Maximum number of forward attempts
    #[arg(long = "retry-max")]
    pub retry_max: Option<u32>,

    /// Initial retry delay in seconds
    #[arg(long = "retry-delay")]
    pub retry_delay: Option<u64>,

    /// Path to configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Test mode - log forwarded readings without contacting the endpoint
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,
}

/// Subcommands for telemetry-relay
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = "telemetry-relay.toml")]
        output: PathBuf,
    },
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Returns true if this is the init command.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Some(Command::Init { .. }))
    }
}
