//! Fragment merging: scans the layered drop-in directories with
//! [`liboverdrop`] (the same scanner the teacher codebase uses for its own
//! config fragments) and folds every fragment found, in precedence order,
//! into a single [`ConfigInput`].

use super::fragments;
use anyhow::{Context, Result};
use fn_error_context::context;
use log::trace;

/// Default interval between update-check polls, in seconds.
pub(crate) const DEFAULT_UPDATE_POLL_INTERVAL_SECS: u64 = 5 * 60;
/// Default interval between inventory submissions, in seconds.
pub(crate) const DEFAULT_INVENTORY_POLL_INTERVAL_SECS: u64 = 60 * 60;
/// Default data directory, overridable by `MENDERCORE_DATA_DIR`.
pub(crate) const DEFAULT_DATA_DIR: &str = "/var/lib/mendercore";

/// Merged, but not yet validated, configuration inputs.
#[derive(Debug)]
pub(crate) struct ConfigInput {
    pub(crate) agent: AgentInput,
    pub(crate) server: ServerInput,
    pub(crate) device: DeviceInput,
}

impl ConfigInput {
    /// Scan `dirs`/`common_path` for `*.toml` fragments and merge them.
    #[context("failed to read and merge config fragments")]
    pub(crate) fn read_configs(
        dirs: Vec<String>,
        common_path: &str,
        extensions: Vec<String>,
    ) -> Result<Self> {
        let scanner = liboverdrop::FragmentScanner::new(dirs, common_path, true, extensions);

        let mut fragments = Vec::new();
        for (_, fpath) in scanner.scan() {
            trace!("reading config fragment '{}'", fpath.display());
            let content = std::fs::read_to_string(&fpath)
                .with_context(|| format!("failed to read file '{}'", fpath.display()))?;
            let frag: fragments::ConfigFragment =
                toml::from_str(&content).context("failed to parse TOML")?;
            fragments.push(frag);
        }

        Ok(Self::merge_fragments(fragments))
    }

    /// Merge fragments in order, later fragments overriding earlier ones
    /// field-by-field.
    pub(crate) fn merge_fragments(fragments: Vec<fragments::ConfigFragment>) -> Self {
        let mut agents = Vec::new();
        let mut servers = Vec::new();
        let mut devices = Vec::new();

        for snip in fragments {
            if let Some(a) = snip.agent {
                agents.push(a);
            }
            if let Some(s) = snip.server {
                servers.push(s);
            }
            if let Some(d) = snip.device {
                devices.push(d);
            }
        }

        Self {
            agent: AgentInput::from_fragments(agents),
            server: ServerInput::from_fragments(servers),
            device: DeviceInput::from_fragments(devices),
        }
    }
}

#[derive(Debug)]
pub(crate) struct AgentInput {
    pub(crate) data_dir: String,
    pub(crate) store_dir: Option<String>,
    pub(crate) inventory_scripts_dir: Option<String>,
    pub(crate) update_poll_interval_secs: u64,
    pub(crate) inventory_poll_interval_secs: u64,
    pub(crate) report_status_errors_fatal: bool,
}

impl AgentInput {
    fn from_fragments(fragments: Vec<fragments::AgentFragment>) -> Self {
        let mut cfg = Self {
            data_dir: std::env::var("MENDERCORE_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()),
            store_dir: None,
            inventory_scripts_dir: None,
            update_poll_interval_secs: DEFAULT_UPDATE_POLL_INTERVAL_SECS,
            inventory_poll_interval_secs: DEFAULT_INVENTORY_POLL_INTERVAL_SECS,
            report_status_errors_fatal: false,
        };

        for snip in fragments {
            if let Some(d) = snip.data_dir {
                cfg.data_dir = d;
            }
            if let Some(s) = snip.store_dir {
                cfg.store_dir = Some(s);
            }
            if let Some(i) = snip.inventory_scripts_dir {
                cfg.inventory_scripts_dir = Some(i);
            }
            if let Some(u) = snip.update_poll_interval_secs {
                cfg.update_poll_interval_secs = u;
            }
            if let Some(i) = snip.inventory_poll_interval_secs {
                cfg.inventory_poll_interval_secs = i;
            }
            if let Some(f) = snip.report_status_errors_fatal {
                cfg.report_status_errors_fatal = f;
            }
        }

        cfg
    }
}

#[derive(Debug, Default)]
pub(crate) struct ServerInput {
    pub(crate) base_url: String,
}

impl ServerInput {
    fn from_fragments(fragments: Vec<fragments::ServerFragment>) -> Self {
        let mut cfg = Self::default();
        for snip in fragments {
            if let Some(u) = snip.base_url {
                cfg.base_url = u;
            }
        }
        cfg
    }
}

#[derive(Debug, Default)]
pub(crate) struct DeviceInput {
    pub(crate) inactive_partition: String,
}

impl DeviceInput {
    fn from_fragments(fragments: Vec<fragments::DeviceFragment>) -> Self {
        let mut cfg = Self::default();
        for snip in fragments {
            if let Some(p) = snip.inactive_partition {
                cfg.inactive_partition = p;
            }
        }
        cfg
    }
}
