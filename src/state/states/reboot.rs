use crate::controller::ControllerApi;
use crate::state::{MenderState, MenderStateHandler, StateContext, StatusCode, UpdateResponse};

use super::done::Done;
use super::error_state::ErrorState;
use super::escalate_if_fatal;

/// Reports `rebooting` and hands control to the bootloader. The persisted
/// `UpdateResponse` (written by `update-install` before entering this
/// state) lets `authorized` recognize the deployment after the reboot.
#[derive(Debug)]
pub struct Reboot {
    ur: UpdateResponse,
}

impl Reboot {
    pub fn new(ur: UpdateResponse) -> Self {
        Reboot { ur }
    }
}

impl MenderStateHandler for Reboot {
    fn id(&self) -> MenderState {
        MenderState::Reboot
    }

    fn handle(
        self: Box<Self>,
        ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        if let Some(e) = escalate_if_fatal(
            ctx.controller
                .report_update_status(Some(&self.ur), StatusCode::Rebooting),
        ) {
            return (Box::new(ErrorState::new(e)), false);
        }

        match ctx.controller.reboot() {
            // A real reboot never returns on success; `Done` here only
            // matters for tests driving a mock controller.
            Ok(()) => (Box::new(Done), false),
            Err(e) => {
                log::error!("reboot failed for '{}': {}", self.ur.id, e.cause());
                (Box::new(ErrorState::new(e.into_fatal())), false)
            }
        }
    }
}
