//! Command-Line Interface (CLI) logic.

mod agent;

use clap::{Parser, Subcommand};
use log::LevelFilter;

/// CLI configuration options.
#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"), version = env!("CARGO_PKG_VERSION"))]
pub(crate) struct CliOptions {
    /// Verbosity level (higher is more verbose).
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbosity: u8,

    /// CLI sub-command.
    #[command(subcommand)]
    pub(crate) cmd: CliCommand,
}

impl CliOptions {
    /// Returns the log-level set via command-line flags.
    pub(crate) fn loglevel(&self) -> LevelFilter {
        match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Dispatch CLI subcommand.
    pub(crate) fn run(self) -> anyhow::Result<()> {
        match self.cmd {
            CliCommand::Agent => agent::run_agent(),
        }
    }
}

/// CLI sub-commands.
#[derive(Debug, Subcommand)]
pub(crate) enum CliCommand {
    /// Long-running agent for OTA updates.
    Agent,
}
