//! Tests for validated configuration.

use http::Method;

use super::ConfigError;
use super::cli::Cli;
use super::toml::TomlConfig;
use super::validated::ValidatedConfig;

const ENDPOINT: &str = "https://ingest.example.com/metrics";

/// Helper to create CLI args from a slice
fn cli(args: &[&str]) -> Cli {
    let mut full_args = vec!["telemetry-relay"];
    full_args.extend(args);
    Cli::parse_from_iter(full_args)
}

/// Helper to create CLI args with the endpoint already set
fn cli_with_endpoint(args: &[&str]) -> Cli {
    let mut full_args = vec!["--endpoint", ENDPOINT];
    full_args.extend(args);
    cli(&full_args)
}

/// Helper to parse TOML config
fn toml(content: &str) -> TomlConfig {
    TomlConfig::parse(content).unwrap()
}
