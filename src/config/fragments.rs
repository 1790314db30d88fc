//! TOML configuration fragments: the on-disk shape each drop-in file may
//! populate. Every field is optional so a fragment can override just the
//! settings it cares about, leaving the rest to earlier-precedence
//! fragments or to [`super::inputs`]'s built-in defaults.

use serde::Deserialize;

/// Top-level configuration stanza recognized in a single TOML fragment.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub(crate) struct ConfigFragment {
    pub(crate) agent: Option<AgentFragment>,
    pub(crate) server: Option<ServerFragment>,
    pub(crate) device: Option<DeviceFragment>,
}

/// Agent-wide timing and filesystem-location knobs.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub(crate) struct AgentFragment {
    /// Directory holding `artifact_info`/`device_type` and, unless
    /// overridden, the inventory scripts directory and persistent store.
    pub(crate) data_dir: Option<String>,
    /// Directory the persistent key-value store is rooted at (default:
    /// `<data_dir>/store`).
    pub(crate) store_dir: Option<String>,
    /// Directory scanned for inventory scripts (default:
    /// `<data_dir>/inventory.d`).
    pub(crate) inventory_scripts_dir: Option<String>,
    /// Interval, in seconds, between update-check polls.
    pub(crate) update_poll_interval_secs: Option<u64>,
    /// Interval, in seconds, between inventory submissions.
    pub(crate) inventory_poll_interval_secs: Option<u64>,
    /// Whether a failed status report should be treated as fatal, rather
    /// than logged and swallowed (see `MenderError`'s design notes).
    pub(crate) report_status_errors_fatal: Option<bool>,
}

/// Deployment server connection details.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub(crate) struct ServerFragment {
    /// Base URL of the deployment server's device-facing API.
    pub(crate) base_url: Option<String>,
}

/// Dual-partition device knobs.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub(crate) struct DeviceFragment {
    /// Path to the inactive root partition's block device.
    pub(crate) inactive_partition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_fragment() {
        let toml = r#"
            [agent]
            data_dir = "/var/lib/mendercore"
            update_poll_interval_secs = 1800
            report_status_errors_fatal = true

            [server]
            base_url = "https://hosted.mender.io"

            [device]
            inactive_partition = "/dev/mmcblk0p3"
        "#;
        let frag: ConfigFragment = toml::from_str(toml).unwrap();
        assert_eq!(
            frag.agent.unwrap().update_poll_interval_secs,
            Some(1800)
        );
        assert_eq!(
            frag.server.unwrap().base_url,
            Some("https://hosted.mender.io".to_string())
        );
    }

    #[test]
    fn an_empty_fragment_is_all_none() {
        let frag: ConfigFragment = toml::from_str("").unwrap();
        assert!(frag.agent.is_none());
        assert!(frag.server.is_none());
        assert!(frag.device.is_none());
    }
}
