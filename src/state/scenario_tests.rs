//! Composed end-to-end transition chains, one per named scenario.
//!
//! The per-state unit tests alongside each `states::*` module already cover
//! every row of the transition table in isolation; these chain several
//! `handle()` calls together on a single shared `MockController` to pin
//! down the scenarios called out explicitly, including the order status
//! reports are emitted in across a whole deployment attempt.

#[cfg(test)]
mod tests {
    use crate::controller::mock::{sample_update_response, MockController};
    use crate::error::MenderError;
    use crate::state::states::authorized::Authorized;
    use crate::state::states::bootstrapped::Bootstrapped;
    use crate::state::states::init::Init;
    use crate::state::states::update_check::UpdateCheck;
    use crate::state::states::update_commit::UpdateCommit;
    use crate::state::states::update_fetch::UpdateFetch;
    use crate::state::{wait, MenderState, MenderStateHandler, StateContext, StatusCode};

    fn run_one(
        state: Box<dyn MenderStateHandler>,
        controller: &mut MockController,
        cancel: &wait::CancelReceiver,
    ) -> Box<dyn MenderStateHandler> {
        let mut ctx = StateContext {
            controller,
            cancel,
        };
        let (next, _cancelled) = state.handle(&mut ctx);
        next
    }

    /// S1 — cold boot, no update: a full first cycle settles back into the
    /// check-wait anchor with exactly the three bootstrap/authorize/check
    /// calls the controller trait exposes and no status reports.
    #[test]
    fn s1_cold_boot_no_update() {
        let (_c, cancel) = wait::channel();
        let mut controller = MockController::new();

        let next = run_one(Box::new(Init), &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::Bootstrapped);

        let next = run_one(next, &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::Authorized);

        let next = run_one(next, &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::UpdateCheckWait);

        let next = run_one(Box::new(UpdateCheck), &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::UpdateCheckWait);

        assert!(controller.reported_statuses.is_empty());
    }

    /// S2 — happy update: fetch, install, and reboot report status in order
    /// and the pipeline carries the same deployment id throughout; after the
    /// (mocked) reboot returns, `authorized` recognizes the pending upgrade
    /// via `has_upgrade` and `update-commit` reports `success`.
    #[test]
    fn s2_happy_update_end_to_end() {
        let (_c, cancel) = wait::channel();
        let mut controller = MockController::new();
        let ur = sample_update_response();
        controller.check_update_result = Some((Some(ur.clone()), None));
        controller.fetch_update_result = Some(Ok((b"firmware-payload".to_vec(), 17)));

        let next = run_one(Box::new(UpdateCheck), &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::UpdateFetch);

        let next = run_one(next, &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::UpdateInstall);

        let next = run_one(next, &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::Reboot);

        let next = run_one(next, &mut controller, &cancel);
        // The mock's `reboot` succeeds, so the pipeline reaches `done`
        // rather than truly exiting the process.
        assert_eq!(next.id(), MenderState::Done);

        assert_eq!(
            controller.reported_statuses,
            vec![
                StatusCode::Downloading,
                StatusCode::Installing,
                StatusCode::Rebooting,
            ]
        );

        // Post-reboot: authorized sees the pending upgrade and commits it.
        let mut post_reboot = MockController::new();
        post_reboot.has_upgrade_result = Some(Ok(Some(ur)));
        let next = run_one(Box::new(Authorized), &mut post_reboot, &cancel);
        assert_eq!(next.id(), MenderState::UpdateCommit);

        let next = run_one(next, &mut post_reboot, &cancel);
        assert_eq!(next.id(), MenderState::UpdateCheckWait);
        assert_eq!(post_reboot.reported_statuses, vec![StatusCode::Success]);
    }

    /// S3 — transient authorize failure: `bootstrapped` loops through
    /// `authorize-wait` and back without ever reaching `done`.
    #[test]
    fn s3_transient_authorize_failure_loops() {
        let (_c, cancel) = wait::channel();
        let mut controller = MockController::new();
        controller.authorize_result =
            Some(Err(MenderError::transient(anyhow::anyhow!("503 service unavailable"))));
        controller.update_poll_interval = std::time::Duration::from_millis(5);

        let next = run_one(Box::new(Bootstrapped), &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::AuthorizeWait);

        // authorize-wait uses get_update_poll_interval as its wait duration
        // in this design; it elapses and loops back to bootstrapped.
        let next = run_one(next, &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::Bootstrapped);

        // Second authorize call (default Ok(())) now succeeds.
        let next = run_one(next, &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::Authorized);
        assert_ne!(next.id(), MenderState::Done);
    }

    /// S4 — fetch fails mid-download: `update-fetch` reports `downloading`
    /// then routes to `update-error`, which reports `failure` and loops
    /// back to `init`.
    #[test]
    fn s4_fetch_fails_mid_download() {
        let (_c, cancel) = wait::channel();
        let mut controller = MockController::new();
        let ur = sample_update_response();
        controller.fetch_update_result =
            Some(Err(MenderError::transient(anyhow::anyhow!("connection reset by peer"))));

        let next = run_one(Box::new(UpdateFetch::new(ur)), &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::UpdateError);

        let next = run_one(next, &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::Init);

        assert_eq!(
            controller.reported_statuses,
            vec![StatusCode::Downloading, StatusCode::Failure]
        );
    }

    /// S5 — server aborts the deployment during the commit's success
    /// report (the literal trigger in spec §8: `ReportUpdateStatus(success)`
    /// returns `aborted (fatal)`): `update-commit` routes that failure
    /// through `escalate_if_fatal`, same as `update-fetch`/`update-install`
    /// do for their own status reports, so `update-commit → error(fatal) →
    /// done` and the `report_status_errors_fatal` switch is actually
    /// reachable on this path.
    #[test]
    fn s5_server_abort_during_commit_status_report_is_fatal() {
        let (_c, cancel) = wait::channel();
        let mut controller = MockController::new();
        let ur = sample_update_response();
        controller.report_update_status_result = Some(Err(MenderError::fatal(anyhow::anyhow!(
            "deployment aborted by server"
        ))));

        let next = run_one(Box::new(UpdateCommit::new(ur)), &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::Error);

        let next = run_one(next, &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::Done);
    }

    /// Commit failures are unconditionally fatal regardless of how the
    /// device layer classified them (§4.4: the next power cycle rolls back
    /// automatically, so looping here would fight the bootloader).
    #[test]
    fn commit_failure_is_always_fatal_even_if_classified_transient() {
        let (_c, cancel) = wait::channel();
        let mut controller = MockController::new();
        let ur = sample_update_response();
        controller.commit_update_result =
            Some(Err(MenderError::transient(anyhow::anyhow!("fw_setenv failed"))));

        let next = run_one(Box::new(UpdateCommit::new(ur)), &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::Error);

        let next = run_one(next, &mut controller, &cancel);
        assert_eq!(next.id(), MenderState::Done);
    }

    /// Deployment id invariant: every status report from `update-fetch`
    /// through `reboot` carries the same deployment id (§3, §8 invariant 4),
    /// even though each state reconstructs a fresh report call rather than
    /// sharing a reference.
    #[test]
    fn deployment_id_is_stable_across_the_pipeline() {
        let (_c, cancel) = wait::channel();
        let mut controller = MockController::new();
        let ur = sample_update_response();
        let deployment_id = ur.id.clone();
        controller.fetch_update_result = Some(Ok((b"payload".to_vec(), 7)));

        let fetch = Box::new(UpdateFetch::new(ur));
        let install = run_one(fetch, &mut controller, &cancel);
        assert_eq!(install.id(), MenderState::UpdateInstall);

        let reboot_state = run_one(install, &mut controller, &cancel);
        assert_eq!(reboot_state.id(), MenderState::Reboot);

        let done = run_one(reboot_state, &mut controller, &cancel);
        assert_eq!(done.id(), MenderState::Done);

        assert_eq!(
            controller.reported_deployment_ids,
            vec![
                Some(deployment_id.clone()),
                Some(deployment_id.clone()),
                Some(deployment_id),
            ]
        );
    }
}
