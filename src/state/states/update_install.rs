use crate::controller::ControllerApi;
use crate::state::{MenderState, MenderStateHandler, StateContext, StatusCode, UpdateResponse};
use std::io::Read;

use super::error_state::ErrorState;
use super::escalate_if_fatal;
use super::reboot::Reboot;
use super::update_error::UpdateError;

/// Reports `installing`, streams the artifact onto the inactive partition,
/// and marks it as the tentative next boot target.
pub struct UpdateInstall {
    ur: UpdateResponse,
    stream: Box<dyn Read + Send>,
    size: u64,
}

impl UpdateInstall {
    pub fn new(ur: UpdateResponse, stream: Box<dyn Read + Send>, size: u64) -> Self {
        UpdateInstall { ur, stream, size }
    }
}

impl std::fmt::Debug for UpdateInstall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateInstall")
            .field("ur", &self.ur)
            .field("size", &self.size)
            .finish()
    }
}

impl MenderStateHandler for UpdateInstall {
    fn id(&self) -> MenderState {
        MenderState::UpdateInstall
    }

    fn handle(
        self: Box<Self>,
        ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        let this = *self;
        let UpdateInstall { ur, stream, size } = this;

        if let Some(e) = escalate_if_fatal(
            ctx.controller.report_update_status(Some(&ur), StatusCode::Installing),
        ) {
            return (Box::new(ErrorState::new(e)), false);
        }

        if let Err(e) = ctx.controller.install_update(
            stream,
            size,
            &ur.device_type,
            ur.image.checksum.as_deref(),
        ) {
            log::warn!("installing update '{}' failed: {}", ur.id, e.cause());
            return (Box::new(UpdateError::new(ur, e)), false);
        }

        if let Err(e) = ctx.controller.enable_updated_partition(&ur) {
            log::warn!(
                "marking partition tentative for '{}' failed: {}",
                ur.id,
                e.cause()
            );
            return (Box::new(UpdateError::new(ur, e)), false);
        }

        (Box::new(Reboot::new(ur)), false)
    }
}
