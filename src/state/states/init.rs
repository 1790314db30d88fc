use crate::controller::ControllerApi;
use crate::state::{MenderState, MenderStateHandler, StateContext};

use super::bootstrapped::Bootstrapped;
use super::error_state::ErrorState;

/// Entry point of the state machine: lazily bootstraps the device key.
#[derive(Debug)]
pub struct Init;

impl MenderStateHandler for Init {
    fn id(&self) -> MenderState {
        MenderState::Init
    }

    fn handle(
        self: Box<Self>,
        ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        match ctx.controller.bootstrap() {
            Ok(()) => (Box::new(Bootstrapped), false),
            Err(e) => (Box::new(ErrorState::new(e)), false),
        }
    }
}
