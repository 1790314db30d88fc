use crate::controller::ControllerApi;
use crate::error::MenderError;
use crate::state::{MenderState, MenderStateHandler, StateContext};

use super::done::Done;
use super::init::Init;

/// Generic error sink reached outside the update pipeline (bootstrap,
/// authorize, update-check, reboot, commit). Fatal errors terminate the
/// agent at `done`; transient ones loop back to `init`, where bootstrap and
/// authorization are idempotent.
#[derive(Debug)]
pub struct ErrorState {
    err: MenderError,
}

impl ErrorState {
    pub fn new(err: MenderError) -> Self {
        ErrorState { err }
    }
}

impl MenderStateHandler for ErrorState {
    fn id(&self) -> MenderState {
        MenderState::Error
    }

    fn handle(
        self: Box<Self>,
        _ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        if self.err.is_fatal() {
            log::error!("fatal error, agent is giving up: {}", self.err.cause());
            (Box::new(Done), false)
        } else {
            log::warn!("transient error, retrying from init: {}", self.err.cause());
            (Box::new(Init), false)
        }
    }
}
