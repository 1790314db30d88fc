use crate::controller::ControllerApi;
use crate::state::wait::WaitOutcome;
use crate::state::{CancellableWait, MenderState, MenderStateHandler, StateContext};

use super::update_check::UpdateCheck;

/// Waits out the poll interval between update checks; a cancel wakes it
/// early without advancing the state graph (used to force an immediate
/// poll).
#[derive(Debug)]
pub struct UpdateCheckWait;

impl MenderStateHandler for UpdateCheckWait {
    fn id(&self) -> MenderState {
        MenderState::UpdateCheckWait
    }

    fn handle(
        self: Box<Self>,
        ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        let wait = CancellableWait::new(ctx.controller.get_update_poll_interval());
        match wait.wait(ctx.cancel) {
            WaitOutcome::Elapsed => (Box::new(UpdateCheck), false),
            WaitOutcome::Cancelled => (Box::new(UpdateCheckWait), true),
        }
    }
}
