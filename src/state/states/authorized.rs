use crate::controller::ControllerApi;
use crate::state::{MenderState, MenderStateHandler, StateContext};

use super::error_state::ErrorState;
use super::update_check_wait::UpdateCheckWait;
use super::update_commit::UpdateCommit;

/// Checks whether the device booted into a tentative, uncommitted partition
/// (post-reboot two-phase commit) before resuming the normal poll loop.
#[derive(Debug)]
pub struct Authorized;

impl MenderStateHandler for Authorized {
    fn id(&self) -> MenderState {
        MenderState::Authorized
    }

    fn handle(
        self: Box<Self>,
        ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        match ctx.controller.has_upgrade() {
            Ok(Some(ur)) => (Box::new(UpdateCommit::new(ur)), false),
            Ok(None) => (Box::new(UpdateCheckWait), false),
            Err(e) => (Box::new(ErrorState::new(e)), false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::mock::{sample_update_response, MockController};
    use crate::state::wait;

    #[test]
    fn no_upgrade_moves_to_update_check_wait() {
        let (_c, cancel) = wait::channel();
        let mut controller = MockController::new();
        let mut ctx = StateContext {
            controller: &mut controller,
            cancel: &cancel,
        };
        let (next, _) = Box::new(Authorized).handle(&mut ctx);
        assert_eq!(next.id(), MenderState::UpdateCheckWait);
    }

    #[test]
    fn pending_upgrade_moves_to_update_commit() {
        let (_c, cancel) = wait::channel();
        let mut controller = MockController::new();
        controller.has_upgrade_result = Some(Ok(Some(sample_update_response())));
        let mut ctx = StateContext {
            controller: &mut controller,
            cancel: &cancel,
        };
        let (next, _) = Box::new(Authorized).handle(&mut ctx);
        assert_eq!(next.id(), MenderState::UpdateCommit);
    }

    #[test]
    fn has_upgrade_error_moves_to_error() {
        let (_c, cancel) = wait::channel();
        let mut controller = MockController::new();
        controller.has_upgrade_result =
            Some(Err(crate::error::MenderError::fatal(anyhow::anyhow!("io"))));
        let mut ctx = StateContext {
            controller: &mut controller,
            cancel: &cancel,
        };
        let (next, _) = Box::new(Authorized).handle(&mut ctx);
        assert_eq!(next.id(), MenderState::Error);
    }
}
