//! Configuration assembly: fragments are scanned and merged into
//! [`inputs::ConfigInput`], then validated into a runtime [`Settings`] that
//! knows how to build a fully-wired [`crate::controller::Controller`].

/// TOML structures.
mod fragments;

/// Configuration fragments.
pub(crate) mod inputs;

use crate::artifact::SimpleArtifactParser;
use crate::controller::Controller;
use crate::device::UBootDevice;
use crate::http::DeploymentClient;
use crate::identity::Identity;
use crate::inventory::Inventory;
use crate::store::FileStore;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the agent: merged and validated fragment
/// inputs, not yet turned into the collaborators a `Controller` owns.
#[derive(Debug)]
pub(crate) struct Settings {
    pub(crate) data_dir: PathBuf,
    pub(crate) store_dir: PathBuf,
    pub(crate) inventory_scripts_dir: PathBuf,
    pub(crate) server_base_url: String,
    pub(crate) inactive_partition: PathBuf,
    pub(crate) update_poll_interval: Duration,
    pub(crate) inventory_poll_interval: Duration,
    pub(crate) report_status_errors_fatal: bool,
}

impl Settings {
    /// Scan the standard drop-in directories and assemble validated
    /// settings, following the same `/usr/lib`, `/run`, `/etc` precedence
    /// order the teacher codebase uses for its own fragments.
    pub(crate) fn assemble() -> Result<Self> {
        let prefixes = vec![
            "/usr/lib/".to_string(),
            "/run/".to_string(),
            "/etc/".to_string(),
        ];
        let common_path = format!("{}/config.d/", clap::crate_name!());
        let extensions = vec!["toml".to_string()];
        let cfg = inputs::ConfigInput::read_configs(prefixes, &common_path, extensions)
            .context("failed to read configuration fragments")?;
        Self::validate(cfg)
    }

    fn validate(cfg: inputs::ConfigInput) -> Result<Self> {
        let data_dir = PathBuf::from(&cfg.agent.data_dir);
        let store_dir = cfg
            .agent
            .store_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("store"));
        let inventory_scripts_dir = cfg
            .agent
            .inventory_scripts_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("inventory.d"));

        if cfg.server.base_url.is_empty() {
            anyhow::bail!("server.base_url is required but was not set in any config fragment");
        }

        Ok(Settings {
            data_dir,
            store_dir,
            inventory_scripts_dir,
            server_base_url: cfg.server.base_url,
            inactive_partition: PathBuf::from(cfg.device.inactive_partition),
            update_poll_interval: Duration::from_secs(cfg.agent.update_poll_interval_secs),
            inventory_poll_interval: Duration::from_secs(cfg.agent.inventory_poll_interval_secs),
            report_status_errors_fatal: cfg.agent.report_status_errors_fatal,
        })
    }

    /// Build a fully-wired production `Controller` from these settings.
    pub(crate) fn build_controller(&self) -> Result<Controller> {
        let identity = Identity::new(&self.data_dir);
        let store = Box::new(
            FileStore::open(&self.store_dir, false).context("failed to open persistent store")?,
        );
        let device = Box::new(UBootDevice::new(&self.inactive_partition));
        let base_url = url::Url::parse(&self.server_base_url)
            .context("failed to parse server.base_url")?;
        let client = DeploymentClient::new(base_url).context("failed to build HTTP client")?;
        let parser = Box::new(SimpleArtifactParser);
        let inventory = Inventory::new(Some(self.inventory_scripts_dir.clone()));

        Ok(Controller::new(
            identity,
            store,
            device,
            client,
            parser,
            inventory,
            self.update_poll_interval,
            self.inventory_poll_interval,
            self.report_status_errors_fatal,
        ))
    }
}
