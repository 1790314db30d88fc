//! One file per state, following the transition table. Stateless states
//! (no payload beyond their id) are plain unit structs; payload-bearing
//! states carry the `UpdateResponse` (and, for `update-install`, the open
//! artifact stream) they were constructed with.

pub mod authorize_wait;
pub mod authorized;
pub mod bootstrapped;
pub mod done;
pub mod error_state;
pub mod init;
pub mod reboot;
pub mod update_check;
pub mod update_check_wait;
pub mod update_commit;
pub mod update_error;
pub mod update_fetch;
pub mod update_install;

use crate::error::MenderError;

/// Status reports are best-effort by default (`report_status_errors_fatal`
/// controls this); a state only needs to react when the controller has
/// already decided the failure is fatal. Non-fatal failures are logged by
/// the controller itself.
pub(super) fn escalate_if_fatal(result: Result<(), MenderError>) -> Option<MenderError> {
    match result {
        Ok(()) => None,
        Err(e) if e.is_fatal() => Some(e),
        Err(_) => None,
    }
}
