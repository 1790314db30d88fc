//! Device abstraction: the dual A/B partition layout and the U-Boot
//! environment variables that record which partition is active, which is
//! tentative, and how many boot attempts remain (§4.4's two-phase commit).
//!
//! `Device` is a trait so the state machine's tests never touch a real
//! partition table or invoke external tools; [`UBootDevice`] is the
//! production implementation, shelling out to `fw_printenv`/`fw_setenv` the
//! same way the teacher codebase shells out to `rpm-ostree`.

use crate::artifact::ParsedArtifact;
use anyhow::{bail, Context, Result};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::Command;

/// External collaborator boundary for the active/inactive partition pair.
pub trait Device: Send + std::fmt::Debug {
    /// Stream `artifact.payload` (of `size` bytes, 0 if unknown) onto the
    /// inactive partition.
    fn install(&self, artifact: ParsedArtifact, size: u64) -> Result<()>;

    /// Mark the inactive (just-written) partition as the next boot target,
    /// tentatively, decrementing the bootloader's retry budget.
    fn enable_updated_partition(&self) -> Result<()>;

    /// Confirm the currently running partition permanently, so the
    /// bootloader will no longer roll back to the previous one.
    fn commit_update(&self) -> Result<()>;

    /// Whether we are currently booted into a tentative (not yet committed)
    /// partition.
    fn has_upgrade(&self) -> Result<bool>;

    /// Initiate a reboot. Only returns if the reboot could not be started.
    fn reboot(&self) -> Result<()>;
}

/// U-Boot-environment-backed dual partition device.
///
/// Partition state lives entirely in the U-Boot environment: `upgrade_available`
/// (tentative boot pending), `bootcount`/`bootlimit` (the retry budget), and
/// `mender_boot_part` (which of the two root partitions is active).
#[derive(Debug)]
pub struct UBootDevice {
    inactive_partition: PathBuf,
    fw_printenv: String,
    fw_setenv: String,
    reboot_cmd: String,
}

impl UBootDevice {
    pub fn new(inactive_partition: impl Into<PathBuf>) -> Self {
        UBootDevice {
            inactive_partition: inactive_partition.into(),
            fw_printenv: "fw_printenv".to_string(),
            fw_setenv: "fw_setenv".to_string(),
            reboot_cmd: "reboot".to_string(),
        }
    }

    /// Override the external tool names (used by tests to point at stub
    /// scripts instead of the real firmware utilities).
    pub fn with_tools(
        inactive_partition: impl Into<PathBuf>,
        fw_printenv: impl Into<String>,
        fw_setenv: impl Into<String>,
        reboot_cmd: impl Into<String>,
    ) -> Self {
        UBootDevice {
            inactive_partition: inactive_partition.into(),
            fw_printenv: fw_printenv.into(),
            fw_setenv: fw_setenv.into(),
            reboot_cmd: reboot_cmd.into(),
        }
    }

    fn read_env(&self, name: &str) -> Result<Option<String>> {
        let output = Command::new(&self.fw_printenv)
            .arg(name)
            .output()
            .with_context(|| format!("failed to run {}", self.fw_printenv))?;

        if !output.status.success() {
            // fw_printenv exits non-zero when the variable is unset.
            return Ok(None);
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text
            .trim()
            .split_once('=')
            .map(|(_, v)| v.trim().to_string()))
    }

    fn write_env(&self, name: &str, value: &str) -> Result<()> {
        let output = Command::new(&self.fw_setenv)
            .arg(name)
            .arg(value)
            .output()
            .with_context(|| format!("failed to run {}", self.fw_setenv))?;

        if !output.status.success() {
            bail!(
                "{} {} {} failed:\n{}",
                self.fw_setenv,
                name,
                value,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(())
    }
}

impl Device for UBootDevice {
    fn install(&self, mut artifact: ParsedArtifact, size: u64) -> Result<()> {
        log::info!(
            "writing {} to {}",
            if size > 0 {
                format!("{} bytes", size)
            } else {
                "artifact payload".to_string()
            },
            self.inactive_partition.display()
        );

        let mut out = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.inactive_partition)
            .with_context(|| format!("failed to open {}", self.inactive_partition.display()))?;

        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = artifact
                .payload
                .read(&mut buf)
                .context("failed to read artifact payload")?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])
                .context("failed to write to inactive partition")?;
        }
        out.flush().context("failed to flush inactive partition")?;
        Ok(())
    }

    fn enable_updated_partition(&self) -> Result<()> {
        self.write_env("upgrade_available", "1")?;
        self.write_env("bootcount", "0")?;
        Ok(())
    }

    fn commit_update(&self) -> Result<()> {
        self.write_env("upgrade_available", "0")?;
        self.write_env("bootcount", "0")
    }

    fn has_upgrade(&self) -> Result<bool> {
        Ok(self.read_env("upgrade_available")?.as_deref() == Some("1"))
    }

    fn reboot(&self) -> Result<()> {
        let status = Command::new(&self.reboot_cmd)
            .status()
            .with_context(|| format!("failed to run {}", self.reboot_cmd))?;
        if !status.success() {
            bail!("{} exited with {}", self.reboot_cmd, status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn artifact(content: &[u8]) -> ParsedArtifact {
        ParsedArtifact {
            payload: Box::new(Cursor::new(content.to_vec())),
        }
    }

    fn stub_tool(script: &str) -> tempfile::TempPath {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write as _;
        write!(f, "#!/bin/sh\n{}\n", script).unwrap();
        use std::os::unix::fs::PermissionsExt;
        let path = f.into_temp_path();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn install_writes_payload_to_inactive_partition() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let device = UBootDevice::with_tools(tmp.path(), "true", "true", "true");
        device.install(artifact(b"image-bytes"), 11).unwrap();
        assert_eq!(std::fs::read(tmp.path()).unwrap(), b"image-bytes");
    }

    #[test]
    fn commit_update_invokes_fw_setenv_successfully() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let device = UBootDevice::with_tools(tmp.path(), "true", "true", "true");
        device.commit_update().unwrap();
    }

    #[test]
    fn fw_setenv_failure_is_reported() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let device = UBootDevice::with_tools(tmp.path(), "true", "false", "true");
        let err = device.commit_update().unwrap_err();
        assert!(err.to_string().contains("failed"));
    }

    #[test]
    fn has_upgrade_parses_fw_printenv_output() {
        let script = stub_tool("echo upgrade_available=1");
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let device = UBootDevice::with_tools(
            tmp.path(),
            script.to_str().unwrap(),
            "true",
            "true",
        );
        assert!(device.has_upgrade().unwrap());
    }

    #[test]
    fn has_upgrade_false_when_variable_unset() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let device = UBootDevice::with_tools(tmp.path(), "false", "true", "true");
        assert!(!device.has_upgrade().unwrap());
    }
}
