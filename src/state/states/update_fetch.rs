use crate::controller::ControllerApi;
use crate::state::{MenderState, MenderStateHandler, StateContext, StatusCode, UpdateResponse};

use super::error_state::ErrorState;
use super::escalate_if_fatal;
use super::update_error::UpdateError;
use super::update_install::UpdateInstall;

/// Reports `downloading` and streams the artifact from the deployment
/// server.
#[derive(Debug)]
pub struct UpdateFetch {
    ur: UpdateResponse,
}

impl UpdateFetch {
    pub fn new(ur: UpdateResponse) -> Self {
        UpdateFetch { ur }
    }
}

impl MenderStateHandler for UpdateFetch {
    fn id(&self) -> MenderState {
        MenderState::UpdateFetch
    }

    fn handle(
        self: Box<Self>,
        ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        if let Some(e) = escalate_if_fatal(
            ctx.controller
                .report_update_status(Some(&self.ur), StatusCode::Downloading),
        ) {
            return (Box::new(ErrorState::new(e)), false);
        }

        match ctx.controller.fetch_update(&self.ur.image.uri) {
            Ok((stream, size)) => (Box::new(UpdateInstall::new(self.ur, stream, size)), false),
            Err(e) => {
                log::warn!("fetching update '{}' failed: {}", self.ur.id, e.cause());
                (Box::new(UpdateError::new(self.ur, e)), false)
            }
        }
    }
}
