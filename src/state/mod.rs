//! The reboot-persistent, cancellable state machine that drives the agent
//! from boot through authorization, update polling, fetch, install, reboot
//! and commit.
//!
//! Each state implements the uniform [`MenderStateHandler`] contract
//! (`handle`, `cancel`, `id`). `handle` consumes the state and returns the
//! next one; `cancel` is delegated to the shared [`wait::Canceller`] that
//! wait-states consult via [`wait::CancellableWait`]. A [`Runner`] drives
//! the loop until a terminal state (`done`) is reached or it is asked to
//! stop.

mod states;
#[cfg(test)]
mod scenario_tests;
pub mod types;
pub mod wait;

pub use types::{ImageRef, MenderState, StatusCode, UpdateResponse};
pub use wait::{Canceller, WaitOutcome};

use crate::controller::ControllerApi;
use std::time::Duration;

/// Everything a state's `handle` needs besides itself: the controller
/// facade and the shared cancel-wait receiver.
#[derive(Debug)]
pub struct StateContext<'a> {
    pub controller: &'a mut dyn ControllerApi,
    pub cancel: &'a wait::CancelReceiver,
}

/// Uniform contract implemented by every state in the machine.
///
/// `handle` consumes `self` (states are single-use once entered) and
/// returns the next state plus whether this step observed a cancel signal.
/// `cancel` is informational bookkeeping only; wait-states are the only
/// ones where it has observable effect, through the shared wait channel.
pub trait MenderStateHandler: std::fmt::Debug {
    /// Stable, unique tag for this state.
    fn id(&self) -> MenderState;

    /// Run this state's logic and return the next state.
    fn handle(self: Box<Self>, ctx: &mut StateContext<'_>) -> (Box<dyn MenderStateHandler>, bool);
}

/// A value embedded by wait-states to implement the cancellable timed wait
/// primitive, composing rather than inheriting the capability.
#[derive(Debug, Clone, Copy)]
pub struct CancellableWait {
    duration: Duration,
}

impl CancellableWait {
    pub fn new(duration: Duration) -> Self {
        CancellableWait { duration }
    }

    /// Block for this wait's duration unless cancelled; see [`wait::wait`].
    pub fn wait(&self, receiver: &wait::CancelReceiver) -> WaitOutcome {
        wait::wait(receiver, self.duration)
    }
}

/// Supervisory handle for an in-progress [`Runner`]: lets another execution
/// context wake a wait early (`cancel`) or request permanent shutdown
/// (`stop`), matching the core's `Cancel()`/`Stop()` surface.
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    canceller: Canceller,
}

impl RunnerHandle {
    /// Wake the currently (or next) active wait-state early, without
    /// otherwise disrupting the state graph.
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Request permanent shutdown; equivalent to a cancel whose receiver
    /// side is about to be dropped by the runner once it observes the
    /// terminal state. In this design, `stop` and `cancel` share the same
    /// underlying signal — the runner's top-level loop is responsible for
    /// checking a separate atomic flag to distinguish "wake me early" from
    /// "shut down for good"; see [`Runner::stop`].
    pub fn stop(&self) {
        self.canceller.cancel();
    }
}

/// Drives the state machine from an initial state to completion.
#[derive(Debug)]
pub struct Runner {
    current: Box<dyn MenderStateHandler>,
    cancel_rx: wait::CancelReceiver,
    canceller: Canceller,
    stop_requested: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl Runner {
    /// Build a runner starting from the `init` state.
    pub fn new() -> Self {
        let (canceller, cancel_rx) = wait::channel();
        Runner {
            current: Box::new(states::init::Init),
            cancel_rx,
            canceller,
            stop_requested: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// A clonable handle external supervisors can use to cancel waits or
    /// request shutdown without owning the runner.
    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle {
            canceller: self.canceller.clone(),
        }
    }

    /// Mark the runner for shutdown and wake any in-progress wait.
    pub fn stop(&self) {
        self.stop_requested
            .store(true, std::sync::atomic::Ordering::SeqCst);
        self.canceller.cancel();
    }

    /// Run until `done` is reached or `stop` is called.
    ///
    /// Returns the final state's id (`done` on normal completion).
    pub fn run(mut self, controller: &mut dyn ControllerApi) -> MenderState {
        loop {
            let id = self.current.id();
            log::info!("entering state '{}'", id);
            crate::metrics::record_state_transition(id.tag());
            if id == MenderState::Done {
                return id;
            }
            if self.stop_requested.load(std::sync::atomic::Ordering::SeqCst) {
                log::info!("stop requested, halting in state '{}'", id);
                return id;
            }

            let mut ctx = StateContext {
                controller,
                cancel: &self.cancel_rx,
            };
            let (next, cancelled) = self.current.handle(&mut ctx);
            if cancelled {
                log::debug!("state '{}' observed a cancel signal", id);
            }
            self.current = next;
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Runner::new()
    }
}

pub use states::{
    authorize_wait::AuthorizeWait, authorized::Authorized, bootstrapped::Bootstrapped,
    done::Done, error_state::ErrorState, init::Init, reboot::Reboot, update_check::UpdateCheck,
    update_check_wait::UpdateCheckWait, update_commit::UpdateCommit, update_error::UpdateError,
    update_fetch::UpdateFetch, update_install::UpdateInstall,
};
