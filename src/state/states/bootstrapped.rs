use crate::controller::ControllerApi;
use crate::state::{MenderState, MenderStateHandler, StateContext};

use super::authorize_wait::AuthorizeWait;
use super::authorized::Authorized;
use super::error_state::ErrorState;

/// Obtains (or refreshes) an auth token from the deployment server.
#[derive(Debug)]
pub struct Bootstrapped;

impl MenderStateHandler for Bootstrapped {
    fn id(&self) -> MenderState {
        MenderState::Bootstrapped
    }

    fn handle(
        self: Box<Self>,
        ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        match ctx.controller.authorize() {
            Ok(()) => (Box::new(Authorized), false),
            Err(e) if e.is_fatal() => (Box::new(ErrorState::new(e)), false),
            Err(_) => (Box::new(AuthorizeWait), false),
        }
    }
}
