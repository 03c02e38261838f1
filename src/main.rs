//! Telemetry Relay
//!
//! Entry point for the telemetry-relay application.

use std::process::ExitCode;
use telemetry_relay::config::{Cli, Command, ValidatedConfig, write_default_config};

mod app;
mod run;

use app::{exit_code, print_config_hint, setup_tracing};

/// Main entry point.
///
/// Excluded from coverage as it's the thin wrapper around testable components.
#[cfg(not(tarpaulin_include))]
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if let Some(Command::Init { output }) = &cli.command {
        return handle_init(output);
    }

    let config = match ValidatedConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            print_config_hint(&e);
            return exit_code::CONFIG_ERROR;
        }
    };

    setup_tracing(config.verbose);
    tracing::info!("{config}");

    run_application(config)
}

/// Handles the `init` subcommand.
fn handle_init(output: &std::path::Path) -> ExitCode {
    match write_default_config(output) {
        Ok(()) => {
            println!("Configuration template written to: {}", output.display());
            exit_code::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code::CONFIG_ERROR
        }
    }
}

/// Runs the relay on a multi-threaded runtime so readings from different
/// devices are filtered and forwarded in parallel.
///
/// Excluded from coverage - requires async runtime.
#[cfg(not(tarpaulin_include))]
fn run_application(config: ValidatedConfig) -> ExitCode {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    let result = runtime.block_on(run::execute(config));
    runtime.shutdown_timeout(std::time::Duration::from_secs(1));

    match result {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            tracing::error!("Application error: {e}");
            exit_code::runtime_error()
        }
    }
}
