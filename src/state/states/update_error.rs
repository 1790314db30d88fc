use crate::controller::ControllerApi;
use crate::error::MenderError;
use crate::state::{MenderState, MenderStateHandler, StateContext, StatusCode, UpdateResponse};

use super::error_state::ErrorState;
use super::escalate_if_fatal;
use super::init::Init;

/// Reached whenever the update pipeline fails between `update-fetch` and
/// `update-install`. Reports `failure` for the deployment and loops back to
/// `init`: a fresh bootstrap/authorize cycle is cheap (both are idempotent)
/// and the server has already seen the failed status. Like every other
/// status report in the pipeline, a fatal failure reporting that status
/// (per `report_status_errors_fatal`) terminates the agent instead.
#[derive(Debug)]
pub struct UpdateError {
    ur: UpdateResponse,
    err: MenderError,
}

impl UpdateError {
    pub fn new(ur: UpdateResponse, err: MenderError) -> Self {
        UpdateError { ur, err }
    }
}

impl MenderStateHandler for UpdateError {
    fn id(&self) -> MenderState {
        MenderState::UpdateError
    }

    fn handle(
        self: Box<Self>,
        ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        log::warn!(
            "update '{}' failed, reporting failure: {}",
            self.ur.id,
            self.err.cause()
        );

        if let Some(e) = escalate_if_fatal(
            ctx.controller
                .report_update_status(Some(&self.ur), StatusCode::Failure),
        ) {
            return (Box::new(ErrorState::new(e)), false);
        }

        (Box::new(Init), false)
    }
}
