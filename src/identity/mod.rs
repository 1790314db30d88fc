//! Device identity: artifact-info / device-type files, and the device key
//! pair used to authenticate with the deployment server.
//!
//! This is one of the "external collaborators" the core spec treats as out
//! of scope for its algorithm, but whose on-disk file contracts are spelled
//! out in §6, so a concrete, idiomatic implementation lives here.

use anyhow::{bail, Context, Result};
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Client version string reported as a built-in inventory attribute.
pub static CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Descriptor built from on-disk identity files for every `CheckUpdate`
/// call; not cached, so editing the files on disk takes effect on the next
/// poll.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CurrentUpdate {
    pub artifact_name: String,
    pub device_type: String,
}

/// Reads identity files from a configurable data directory.
#[derive(Clone, Debug)]
pub struct Identity {
    artifact_info_path: PathBuf,
    device_type_path: PathBuf,
}

impl Identity {
    /// Build an identity reader rooted at `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Identity {
            artifact_info_path: data_dir.join("artifact_info"),
            device_type_path: data_dir.join("device_type"),
        }
    }

    /// Build an identity reader from explicit file paths, bypassing the
    /// data-directory convention (used by tests and unusual deployments).
    pub fn with_paths(
        artifact_info_path: impl Into<PathBuf>,
        device_type_path: impl Into<PathBuf>,
    ) -> Self {
        Identity {
            artifact_info_path: artifact_info_path.into(),
            device_type_path: device_type_path.into(),
        }
    }

    /// Build the `CurrentUpdate` descriptor used by `CheckUpdate`.
    pub fn current_update(&self) -> Result<CurrentUpdate> {
        let artifact_info = parse_kv_file(&self.artifact_info_path)
            .with_context(|| format!("failed to parse {}", self.artifact_info_path.display()))?;
        let device_type = parse_kv_file(&self.device_type_path)
            .with_context(|| format!("failed to parse {}", self.device_type_path.display()))?;

        Ok(CurrentUpdate {
            artifact_name: artifact_info
                .get("artifact_name")
                .cloned()
                .unwrap_or_default(),
            device_type: device_type.get("device_type").cloned().unwrap_or_default(),
        })
    }
}

/// Parse a newline-separated `key=value` file.
///
/// A missing or empty file yields an empty map (not an error). A non-empty
/// line with no `=` is a format error.
fn parse_kv_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e).context("failed to read file"),
    };

    let mut map = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) => {
                map.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => bail!("malformed line (missing '='): '{}'", line),
        }
    }
    Ok(map)
}

/// Generate a fresh Ed25519 device key pair, PEM-encoded (PKCS#8).
pub fn generate_device_key_pem() -> Result<String> {
    let mut csprng = OsRng;
    let signing_key = SigningKey::generate(&mut csprng);
    let pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .context("failed to encode device key as PKCS#8 PEM")?;
    Ok(pem.to_string())
}

/// Sign `message` with the PEM-encoded device key, returning the raw
/// signature bytes sent alongside auth requests.
pub fn sign_with_key_pem(pem: &str, message: &[u8]) -> Result<Vec<u8>> {
    let signing_key =
        SigningKey::from_pkcs8_pem(pem).context("failed to decode device key from PEM")?;
    let signature = signing_key.sign(message);
    Ok(signature.to_bytes().to_vec())
}
