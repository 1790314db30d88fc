use crate::controller::ControllerApi;
use crate::state::{MenderState, MenderStateHandler, StateContext};

use super::error_state::ErrorState;
use super::update_check_wait::UpdateCheckWait;
use super::update_fetch::UpdateFetch;

/// Polls the deployment server for a pending update.
#[derive(Debug)]
pub struct UpdateCheck;

impl MenderStateHandler for UpdateCheck {
    fn id(&self) -> MenderState {
        MenderState::UpdateCheck
    }

    fn handle(
        self: Box<Self>,
        ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        match ctx.controller.check_update() {
            (Some(ur), Some(e)) if crate::error::is_already_installed(&e) => {
                log::info!(
                    "offered update '{}' is already installed, skipping",
                    ur.artifact_name
                );
                (Box::new(UpdateCheckWait), false)
            }
            (Some(ur), _) => (Box::new(UpdateFetch::new(ur)), false),
            (None, Some(e)) => {
                log::warn!("update check failed: {}", e.cause());
                (Box::new(ErrorState::new(e)), false)
            }
            (None, None) => (Box::new(UpdateCheckWait), false),
        }
    }
}
