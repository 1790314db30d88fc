//! Reboot-persistent, cancellable OTA update agent.

#![deny(missing_debug_implementations)]

/// Signed artifact container parsing.
mod artifact;
mod cli;
/// File-based configuration.
mod config;
/// Controller facade driving the state machine.
mod controller;
/// Dual-partition device abstraction.
mod device;
/// Error classification shared by the controller and state machine.
mod error;
/// Deployment-server HTTP client.
mod http;
/// Device identity and key material.
mod identity;
/// Inventory attribute collection.
mod inventory;
/// In-memory log ring buffer.
mod log_buffer;
/// Metrics service.
mod metrics;
/// The reboot-persistent, cancellable state machine.
mod state;
/// Persistent key-value store.
mod store;

use clap::{crate_name, Parser};

/// Binary entrypoint, for all CLI subcommands.
fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

/// Run till completion or failure, pretty-printing termination errors if any.
fn run() -> i32 {
    // Parse command-line options.
    let cli_opts = cli::CliOptions::parse();

    // Setup logging.
    if let Err(e) = log_buffer::init(cli_opts.loglevel(), Some(crate_name!())) {
        eprintln!("failed to initialize logging: {}", e);
        return libc::EXIT_FAILURE;
    }

    // Dispatch CLI subcommand.
    match cli_opts.run() {
        Ok(_) => libc::EXIT_SUCCESS,
        Err(e) => {
            log_error_chain(e);
            libc::EXIT_FAILURE
        }
    }
}

/// Pretty-print a chain of errors, as a series of error-priority log messages.
fn log_error_chain(err_chain: anyhow::Error) {
    let mut chain_iter = err_chain.chain();
    let top_err = match chain_iter.next() {
        Some(e) => e.to_string(),
        None => "(unspecified failure)".to_string(),
    };
    log::error!("critical error: {}", top_err);
    for err in chain_iter {
        log::error!(" -> {}", err);
    }
}
