use crate::controller::ControllerApi;
use crate::state::{MenderState, MenderStateHandler, StateContext, StatusCode, UpdateResponse};

use super::error_state::ErrorState;
use super::escalate_if_fatal;
use super::update_check_wait::UpdateCheckWait;

/// Confirms the partition booted into after an install + reboot, closing
/// out the two-phase commit. A commit failure is always fatal: the next
/// power cycle rolls back automatically, so looping here would fight the
/// bootloader.
#[derive(Debug)]
pub struct UpdateCommit {
    ur: UpdateResponse,
}

impl UpdateCommit {
    pub fn new(ur: UpdateResponse) -> Self {
        UpdateCommit { ur }
    }
}

impl MenderStateHandler for UpdateCommit {
    fn id(&self) -> MenderState {
        MenderState::UpdateCommit
    }

    fn handle(
        self: Box<Self>,
        ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        if let Err(e) = ctx.controller.commit_update() {
            log::error!("commit failed for '{}': {}", self.ur.id, e.cause());
            return (Box::new(ErrorState::new(e.into_fatal())), false);
        }

        if let Some(e) = escalate_if_fatal(
            ctx.controller
                .report_update_status(Some(&self.ur), StatusCode::Success),
        ) {
            return (Box::new(ErrorState::new(e)), false);
        }

        (Box::new(UpdateCheckWait), false)
    }
}
