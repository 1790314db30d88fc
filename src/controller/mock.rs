//! A scriptable `ControllerApi` used by state-machine transition tests, so
//! each state's logic can be exercised without any real network, device, or
//! filesystem access.
//!
//! Each field is consumed (`Option::take`) on first use and falls back to a
//! benign default afterwards; tests that need more than one call's worth of
//! a particular outcome should construct a fresh `MockController` per
//! assertion rather than relying on repeat behavior.

use super::ControllerApi;
use crate::error::{MenderError, Result};
use crate::state::{StatusCode, UpdateResponse};
use std::cell::RefCell;
use std::io::{Cursor, Read};
use std::time::Duration;

#[derive(Debug)]
pub struct MockController {
    pub bootstrap_result: Option<Result<()>>,
    pub authorize_result: Option<Result<()>>,
    pub check_update_result: Option<(Option<UpdateResponse>, Option<MenderError>)>,
    pub fetch_update_result: Option<Result<(Vec<u8>, u64)>>,
    pub install_update_result: Option<Result<()>>,
    pub enable_updated_partition_result: Option<Result<()>>,
    pub reboot_result: Option<Result<()>>,
    pub commit_update_result: Option<Result<()>>,
    pub report_update_status_result: Option<Result<()>>,
    pub upload_log_result: Option<Result<()>>,
    pub has_upgrade_result: Option<Result<Option<UpdateResponse>>>,
    pub update_poll_interval: Duration,
    pub inventory_poll_interval: Duration,
    pub current_artifact_name_result: RefCell<Option<Result<String>>>,
    pub inventory_refresh_result: Option<Result<()>>,
    pub force_bootstrap_called: bool,
    pub reported_statuses: Vec<StatusCode>,
    pub reported_deployment_ids: Vec<Option<String>>,
}

impl MockController {
    pub fn new() -> Self {
        MockController {
            bootstrap_result: None,
            authorize_result: None,
            check_update_result: None,
            fetch_update_result: None,
            install_update_result: None,
            enable_updated_partition_result: None,
            reboot_result: None,
            commit_update_result: None,
            report_update_status_result: None,
            upload_log_result: None,
            has_upgrade_result: None,
            update_poll_interval: Duration::from_millis(10),
            inventory_poll_interval: Duration::from_millis(10),
            current_artifact_name_result: RefCell::new(None),
            inventory_refresh_result: None,
            force_bootstrap_called: false,
            reported_statuses: Vec::new(),
            reported_deployment_ids: Vec::new(),
        }
    }
}

impl Default for MockController {
    fn default() -> Self {
        MockController::new()
    }
}

impl ControllerApi for MockController {
    fn bootstrap(&mut self) -> Result<()> {
        self.bootstrap_result.take().unwrap_or(Ok(()))
    }

    fn force_bootstrap(&mut self) {
        self.force_bootstrap_called = true;
    }

    fn authorize(&mut self) -> Result<()> {
        self.authorize_result.take().unwrap_or(Ok(()))
    }

    fn check_update(&mut self) -> (Option<UpdateResponse>, Option<MenderError>) {
        self.check_update_result.take().unwrap_or((None, None))
    }

    fn fetch_update(&mut self, _uri: &str) -> Result<(Box<dyn Read + Send>, u64)> {
        match self.fetch_update_result.take() {
            Some(Ok((bytes, len))) => Ok((Box::new(Cursor::new(bytes)), len)),
            Some(Err(e)) => Err(e),
            None => Ok((Box::new(Cursor::new(Vec::new())), 0)),
        }
    }

    fn install_update(
        &mut self,
        _stream: Box<dyn Read + Send>,
        _size: u64,
        _device_type: &str,
        _checksum: Option<&str>,
    ) -> Result<()> {
        self.install_update_result.take().unwrap_or(Ok(()))
    }

    fn enable_updated_partition(&mut self, _ur: &UpdateResponse) -> Result<()> {
        self.enable_updated_partition_result.take().unwrap_or(Ok(()))
    }

    fn reboot(&mut self) -> Result<()> {
        self.reboot_result.take().unwrap_or(Ok(()))
    }

    fn commit_update(&mut self) -> Result<()> {
        self.commit_update_result.take().unwrap_or(Ok(()))
    }

    fn report_update_status(
        &mut self,
        ur: Option<&UpdateResponse>,
        status: StatusCode,
    ) -> Result<()> {
        self.reported_statuses.push(status);
        self.reported_deployment_ids.push(ur.map(|u| u.id.clone()));
        self.report_update_status_result.take().unwrap_or(Ok(()))
    }

    fn upload_log(&mut self, _ur: &UpdateResponse) -> Result<()> {
        self.upload_log_result.take().unwrap_or(Ok(()))
    }

    fn has_upgrade(&mut self) -> Result<Option<UpdateResponse>> {
        self.has_upgrade_result.take().unwrap_or(Ok(None))
    }

    fn get_update_poll_interval(&self) -> Duration {
        self.update_poll_interval
    }

    fn get_inventory_poll_interval(&self) -> Duration {
        self.inventory_poll_interval
    }

    fn get_current_artifact_name(&self) -> Result<String> {
        self.current_artifact_name_result
            .borrow_mut()
            .take()
            .unwrap_or_else(|| Ok("test-artifact".to_string()))
    }

    fn inventory_refresh(&mut self) -> Result<()> {
        self.inventory_refresh_result.take().unwrap_or(Ok(()))
    }
}

/// Build a minimal `UpdateResponse` fixture for tests.
pub fn sample_update_response() -> UpdateResponse {
    UpdateResponse {
        id: "dep-1".to_string(),
        artifact_name: "release-2".to_string(),
        device_type: "qemux86-64".to_string(),
        image: crate::state::ImageRef {
            uri: "https://example.test/artifact.bin".to_string(),
            checksum: Some("abc123".to_string()),
        },
    }
}
