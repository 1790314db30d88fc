use crate::state::{MenderState, MenderStateHandler, StateContext};

/// Terminal state. The runner checks `id() == Done` before calling `handle`
/// and stops there, so `handle` is only reached if something re-enters this
/// state directly — a programmer error. Debug builds assert; release builds
/// treat it as an idempotent no-op and stay put.
#[derive(Debug)]
pub struct Done;

impl MenderStateHandler for Done {
    fn id(&self) -> MenderState {
        MenderState::Done
    }

    fn handle(
        self: Box<Self>,
        _ctx: &mut StateContext<'_>,
    ) -> (Box<dyn MenderStateHandler>, bool) {
        debug_assert!(false, "programmer error: re-entered terminal state 'done'");
        log::error!("re-entered terminal state 'done'; ignoring");
        (Box::new(Done), false)
    }
}
