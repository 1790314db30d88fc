//! Data types shared by every state: the state-id tag and the deployment
//! descriptor that survives a reboot.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Enumerated tag identifying each state, for logging and persistence.
///
/// Encodes to/from a short lowercase textual tag; the tag set is exactly
/// this enumeration, so an unknown tag fails to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MenderState {
    Init,
    Bootstrapped,
    AuthorizeWait,
    Authorized,
    UpdateCheckWait,
    UpdateCheck,
    UpdateFetch,
    UpdateInstall,
    Reboot,
    UpdateCommit,
    UpdateError,
    Error,
    Done,
}

impl MenderState {
    /// Short textual tag used on the wire and in logs.
    pub fn tag(self) -> &'static str {
        match self {
            MenderState::Init => "init",
            MenderState::Bootstrapped => "bootstrapped",
            MenderState::AuthorizeWait => "authorize-wait",
            MenderState::Authorized => "authorized",
            MenderState::UpdateCheckWait => "update-check-wait",
            MenderState::UpdateCheck => "update-check",
            MenderState::UpdateFetch => "update-fetch",
            MenderState::UpdateInstall => "update-install",
            MenderState::Reboot => "reboot",
            MenderState::UpdateCommit => "update-commit",
            MenderState::UpdateError => "update-error",
            MenderState::Error => "error",
            MenderState::Done => "done",
        }
    }
}

impl std::fmt::Display for MenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for MenderState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s {
            "init" => MenderState::Init,
            "bootstrapped" => MenderState::Bootstrapped,
            "authorize-wait" => MenderState::AuthorizeWait,
            "authorized" => MenderState::Authorized,
            "update-check-wait" => MenderState::UpdateCheckWait,
            "update-check" => MenderState::UpdateCheck,
            "update-fetch" => MenderState::UpdateFetch,
            "update-install" => MenderState::UpdateInstall,
            "reboot" => MenderState::Reboot,
            "update-commit" => MenderState::UpdateCommit,
            "update-error" => MenderState::UpdateError,
            "error" => MenderState::Error,
            "done" => MenderState::Done,
            other => anyhow::bail!("unknown mender state tag '{}'", other),
        };
        Ok(state)
    }
}

impl Serialize for MenderState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for MenderState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        MenderState::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

/// Reference to the image payload offered by a deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Location the artifact can be fetched from.
    pub uri: String,
    /// Optional checksum the installer verifies the downloaded payload against.
    pub checksum: Option<String>,
}

/// Immutable descriptor of a pending deployment.
///
/// Created by `CheckUpdate` and carried verbatim through fetch, install,
/// reboot, commit and error states, so every status report for a given
/// deployment references the same `id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// Server-assigned deployment identifier.
    pub id: String,
    /// Artifact name offered by the server.
    pub artifact_name: String,
    /// Device-type constraint the artifact declares compatibility with.
    pub device_type: String,
    /// Where (and how) to fetch the image payload.
    pub image: ImageRef,
}

/// Status codes reported to the deployment server over the lifetime of an
/// update attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusCode {
    Downloading,
    Installing,
    Rebooting,
    Success,
    Failure,
    AlreadyInstalled,
}

impl StatusCode {
    pub fn tag(self) -> &'static str {
        match self {
            StatusCode::Downloading => "downloading",
            StatusCode::Installing => "installing",
            StatusCode::Rebooting => "rebooting",
            StatusCode::Success => "success",
            StatusCode::Failure => "failure",
            StatusCode::AlreadyInstalled => "already-installed",
        }
    }
}
