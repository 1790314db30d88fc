use crate::controller::ControllerApi;
use crate::state::wait::WaitOutcome;
use crate::state::{CancellableWait, MenderState, MenderStateHandler, StateContext};

use super::bootstrapped::Bootstrapped;

/// Waits out the retry interval after a transient authorization failure,
/// then retries from `bootstrapped`.
#[derive(Debug)]
pub struct AuthorizeWait;

impl MenderStateHandler for AuthorizeWait {
    fn id(&self) -> MenderState {
        MenderState::AuthorizeWait
    }

    fn handle(
        self: Box<Self>,
        ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        let wait = CancellableWait::new(ctx.controller.get_update_poll_interval());
        match wait.wait(ctx.cancel) {
            WaitOutcome::Elapsed => (Box::new(Bootstrapped), false),
            WaitOutcome::Cancelled => (Box::new(AuthorizeWait), true),
        }
    }
}
