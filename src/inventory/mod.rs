//! Inventory attribute collection: built-in attributes plus whatever a
//! directory of executable inventory scripts reports on stdout.
//!
//! Script discovery follows the same directory-scanning idiom the teacher
//! uses for its configuration fragments (read a directory, process entries
//! in a stable, sorted order); script execution follows the same
//! `std::process::Command` + captured-output idiom as the `rpm-ostree` CLI
//! wrappers.

use crate::http::InventoryAttribute;
use crate::identity::{Identity, CLIENT_VERSION};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::Command;

/// Collects built-in and script-reported inventory attributes.
#[derive(Debug)]
pub struct Inventory {
    scripts_dir: Option<PathBuf>,
}

impl Inventory {
    /// Build a collector that also runs every executable file directly
    /// under `scripts_dir`, if given.
    pub fn new(scripts_dir: Option<PathBuf>) -> Self {
        Inventory { scripts_dir }
    }

    /// Collect the full attribute set: built-ins first, then script output.
    ///
    /// Duplicates by name are allowed and all values are submitted (the
    /// server, not this collector, decides what to do with e.g. multiple
    /// `ipv4_eth0` values reported by different scripts); this deliberately
    /// does not dedup, unlike a plain merge-by-key map would.
    pub fn collect(&self, identity: &Identity) -> Result<Vec<InventoryAttribute>> {
        let mut attrs = self.builtins(identity)?;
        if let Some(dir) = &self.scripts_dir {
            attrs.extend(self.run_scripts(dir)?);
        }
        Ok(attrs)
    }

    fn builtins(&self, identity: &Identity) -> Result<Vec<InventoryAttribute>> {
        let current = identity.current_update()?;
        Ok(vec![
            InventoryAttribute {
                name: "device_type".to_string(),
                value: current.device_type,
            },
            InventoryAttribute {
                name: "artifact_name".to_string(),
                value: current.artifact_name,
            },
            InventoryAttribute {
                name: "mender_client_version".to_string(),
                value: CLIENT_VERSION.to_string(),
            },
        ])
    }

    fn run_scripts(&self, dir: &PathBuf) -> Result<Vec<InventoryAttribute>> {
        let mut entries: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("failed to read inventory scripts directory"),
        };
        entries.sort();

        let mut attrs = Vec::new();
        for script in entries {
            match run_one_script(&script) {
                Ok(mut parsed) => attrs.append(&mut parsed),
                Err(e) => log::warn!("inventory script {} failed: {}", script.display(), e),
            }
        }
        Ok(attrs)
    }
}

fn run_one_script(path: &PathBuf) -> Result<Vec<InventoryAttribute>> {
    let output = Command::new(path)
        .output()
        .with_context(|| format!("failed to run {}", path.display()))?;
    if !output.status.success() {
        anyhow::bail!(
            "{} exited with {}:\n{}",
            path.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut attrs = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once('=') {
            Some((name, value)) => attrs.push(InventoryAttribute {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            }),
            None => log::warn!("ignoring malformed inventory line from {}: '{}'", path.display(), line),
        }
    }
    Ok(attrs)
}
