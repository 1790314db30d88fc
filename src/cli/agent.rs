//! Logic for the `agent` subcommand.

use crate::{config, metrics, state};
use anyhow::{Context, Result};
use clap::{crate_name, crate_version};
use log::{info, trace};

/// Agent subcommand entry-point.
pub(crate) fn run_agent() -> Result<()> {
    info!(
        "starting update agent ({} {})",
        crate_name!(),
        crate_version!()
    );

    let settings = config::Settings::assemble().context("failed to assemble configuration")?;
    let mut controller = settings
        .build_controller()
        .context("failed to build controller")?;

    trace!("creating metrics service");
    match metrics::MetricsService::bind_socket() {
        Ok(service) => service.spawn(),
        Err(e) => log::warn!("metrics service disabled: {}", e),
    }

    let runner = state::Runner::new();
    let handle = runner.handle();

    // Start a dedicated signal-handling thread in its own runtime, the same
    // pattern the teacher uses to keep signal plumbing off the main thread:
    // forward SIGTERM/SIGINT into the runner's `Stop()` surface.
    let signal_handling_rt = tokio::runtime::Runtime::new().context("failed to start signal-handling runtime")?;
    signal_handling_rt.spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                return;
            }
        };
        let mut interrupt = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                log::error!("failed to install SIGINT handler: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = terminate.recv() => log::info!("received SIGTERM, stopping"),
            _ = interrupt.recv() => log::info!("received SIGINT, stopping"),
        }
        handle.stop();
    });

    let final_state = runner.run(&mut controller);
    info!("agent stopped in state '{}'", final_state);

    Ok(())
}
