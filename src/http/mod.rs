//! Deployment server HTTP client.
//!
//! The wire contract (`SPEC_FULL.md` §6) is a small REST surface; this
//! client follows the same request/response shape the teacher's FleetLock
//! and Cincinnati clients use — a `reqwest::Client`, per-call request
//! builders, typed (de)serialization of the JSON bodies — but bridges it
//! into the synchronous world the state machine runs in (§5) by owning a
//! single-threaded `tokio::runtime::Runtime` and driving every call with
//! `block_on`, rather than adding reqwest's blocking feature, matching how
//! the teacher's own tests call `runtime.block_on(...)` on its async client
//! methods.

use crate::error::{MenderError, Result};
use crate::identity::{CurrentUpdate, Identity};
use crate::state::{StatusCode, UpdateResponse};
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use std::sync::Mutex;

const AUTH_REQUESTS_PATH: &str = "api/devices/v1/authentication/auth_requests";
const DEPLOYMENTS_NEXT_PATH: &str = "api/devices/v1/deployments/device/deployments/next";
const INVENTORY_PATH: &str = "api/devices/v1/inventory/device/attributes";

#[derive(Serialize)]
struct AuthRequest<'a> {
    id_data: String,
    pubkey: &'a str,
    tenant_token: Option<&'a str>,
}

#[derive(Serialize)]
struct DeploymentsNextRequest<'a> {
    artifact_name: &'a str,
    device_type: &'a str,
}

#[derive(Deserialize)]
struct DeploymentsNextResponse {
    id: String,
    artifact: DeploymentArtifactJson,
}

#[derive(Deserialize)]
struct DeploymentArtifactJson {
    artifact_name: String,
    device_types_compatible: Vec<String>,
    source: DeploymentArtifactSource,
}

#[derive(Deserialize)]
struct DeploymentArtifactSource {
    uri: String,
    #[serde(default)]
    checksum: Option<String>,
}

#[derive(Serialize)]
struct StatusReportBody {
    status: StatusCode,
}

#[derive(Serialize)]
struct LogReportBody<'a> {
    messages: &'a [String],
}

/// Inventory attribute, as submitted to the deployment server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryAttribute {
    pub name: String,
    pub value: String,
}

/// Deployment server client, synchronous from the state machine's point of
/// view.
pub struct DeploymentClient {
    base_url: url::Url,
    hclient: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    auth_token: Mutex<Option<Vec<u8>>>,
}

impl std::fmt::Debug for DeploymentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DeploymentClient {
    /// Build a client talking to `base_url`.
    pub fn new(base_url: url::Url) -> Result<Self> {
        let hclient = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| MenderError::fatal(anyhow::anyhow!(e)))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| MenderError::fatal(anyhow::anyhow!(e)))?;
        Ok(DeploymentClient {
            base_url,
            hclient,
            runtime,
            auth_token: Mutex::new(None),
        })
    }

    pub fn set_auth_token(&self, token: Vec<u8>) {
        *self.auth_token.lock().unwrap() = Some(token);
    }

    fn bearer(&self) -> Option<String> {
        self.auth_token
            .lock()
            .unwrap()
            .as_ref()
            .map(|t| format!("Bearer {}", String::from_utf8_lossy(t)))
    }

    fn url(&self, path: &str) -> Result<url::Url> {
        self.base_url
            .join(path)
            .map_err(|e| MenderError::fatal(anyhow::anyhow!(e)))
    }

    /// Authenticate with the deployment server, signing the request body
    /// with the device's private key, and return the raw token bytes.
    pub fn authorize(&self, key_pem: &str, identity: &Identity) -> Result<Vec<u8>> {
        let current = identity
            .current_update()
            .map_err(MenderError::transient)?;
        let payload = AuthRequest {
            id_data: format!("{{\"device_type\":\"{}\"}}", current.device_type),
            pubkey: key_pem,
            tenant_token: None,
        };
        let body = serde_json::to_vec(&payload).map_err(MenderError::transient)?;
        let signature = crate::identity::sign_with_key_pem(key_pem, &body)
            .map_err(MenderError::transient)?;

        let url = self.url(AUTH_REQUESTS_PATH)?;
        let hclient = self.hclient.clone();
        let signature_b64 = BASE64_STANDARD.encode(&signature);

        self.runtime.block_on(async move {
            let response = hclient
                .post(url)
                .header("X-MEN-Signature", signature_b64)
                .header("Content-Type", "application/json")
                .body(body)
                .send()
                .await
                .map_err(|e| MenderError::transient(anyhow::anyhow!(e)))?;

            if response.status() == reqwest::StatusCode::UNAUTHORIZED {
                return Err(MenderError::transient(anyhow::anyhow!(
                    "401 unauthorized during authorization"
                )));
            }
            if !response.status().is_success() {
                return Err(MenderError::transient(anyhow::anyhow!(
                    "auth_requests returned {}",
                    response.status()
                )));
            }
            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| MenderError::transient(anyhow::anyhow!(e)))
        })
    }

    /// Ask the server for the next deployment, if any.
    pub fn check_update(&self, current: &CurrentUpdate) -> Result<Option<UpdateResponse>> {
        let url = self.url(DEPLOYMENTS_NEXT_PATH)?;
        let hclient = self.hclient.clone();
        let bearer = self.bearer();
        let request = DeploymentsNextRequest {
            artifact_name: &current.artifact_name,
            device_type: &current.device_type,
        };

        self.runtime.block_on(async move {
            let mut req = hclient.get(url).query(&request);
            if let Some(token) = bearer {
                req = req.header("Authorization", token);
            }
            let response = req
                .send()
                .await
                .map_err(|e| MenderError::transient(anyhow::anyhow!(e)))?;

            match response.status() {
                reqwest::StatusCode::NO_CONTENT => Ok(None),
                reqwest::StatusCode::UNAUTHORIZED => Err(MenderError::transient(anyhow::anyhow!(
                    "401 unauthorized during check_update"
                ))),
                status if status.is_success() => {
                    let parsed: DeploymentsNextResponse = response
                        .json()
                        .await
                        .map_err(|e| MenderError::transient(anyhow::anyhow!(e)))?;
                    Ok(Some(UpdateResponse {
                        id: parsed.id,
                        artifact_name: parsed.artifact.artifact_name,
                        device_type: parsed
                            .artifact
                            .device_types_compatible
                            .first()
                            .cloned()
                            .unwrap_or_default(),
                        image: crate::state::ImageRef {
                            uri: parsed.artifact.source.uri,
                            checksum: parsed.artifact.source.checksum,
                        },
                    }))
                }
                status => Err(MenderError::transient(anyhow::anyhow!(
                    "deployments/next returned {}",
                    status
                ))),
            }
        })
    }

    /// Fetch the artifact at `uri`, returning a readable stream and its
    /// advertised length (0 if the server didn't send one).
    ///
    /// Buffers the full artifact in memory before returning; a production
    /// client streaming multi-gigabyte images would bridge the async body
    /// stream chunk-by-chunk instead. See `DESIGN.md`.
    pub fn fetch(&self, uri: &str) -> Result<(Box<dyn Read + Send>, u64)> {
        let url = url::Url::parse(uri).map_err(|e| MenderError::fatal(anyhow::anyhow!(e)))?;
        let hclient = self.hclient.clone();

        let (bytes, len) = self.runtime.block_on(async move {
            let response = hclient
                .get(url)
                .send()
                .await
                .map_err(|e| MenderError::transient(anyhow::anyhow!(e)))?;
            if !response.status().is_success() {
                return Err(MenderError::transient(anyhow::anyhow!(
                    "artifact fetch returned {}",
                    response.status()
                )));
            }
            let len = response.content_length().unwrap_or(0);
            let bytes = response
                .bytes()
                .await
                .map_err(|e| MenderError::transient(anyhow::anyhow!(e)))?;
            Ok::<_, MenderError>((bytes.to_vec(), len))
        })?;

        Ok((Box::new(Cursor::new(bytes)), len))
    }

    /// Report deployment status. `ur` is `None` only for the already-installed
    /// bookkeeping path, which has no deployment id to report against.
    pub fn report_status(&self, ur: Option<&UpdateResponse>, status: StatusCode) -> Result<()> {
        let Some(ur) = ur else {
            log::debug!("no deployment id to report status {:?} against", status);
            return Ok(());
        };
        let url = self.url(&format!(
            "api/devices/v1/deployments/device/deployments/{}/status",
            ur.id
        ))?;
        let hclient = self.hclient.clone();
        let bearer = self.bearer();
        let body = StatusReportBody { status };

        self.runtime.block_on(async move {
            let mut req = hclient.put(url).json(&body);
            if let Some(token) = bearer {
                req = req.header("Authorization", token);
            }
            let response = req
                .send()
                .await
                .map_err(|e| MenderError::transient(anyhow::anyhow!(e)))?;
            if !response.status().is_success() {
                return Err(MenderError::transient(anyhow::anyhow!(
                    "status report returned {}",
                    response.status()
                )));
            }
            Ok(())
        })
    }

    /// Upload the agent's recent log lines for `ur`.
    pub fn upload_log(&self, ur: &UpdateResponse, messages: &[String]) -> Result<()> {
        let url = self.url(&format!(
            "api/devices/v1/deployments/device/deployments/{}/log",
            ur.id
        ))?;
        let hclient = self.hclient.clone();
        let bearer = self.bearer();
        let body = LogReportBody { messages };

        self.runtime.block_on(async move {
            let mut req = hclient.put(url).json(&body);
            if let Some(token) = bearer {
                req = req.header("Authorization", token);
            }
            let response = req
                .send()
                .await
                .map_err(|e| MenderError::transient(anyhow::anyhow!(e)))?;
            if !response.status().is_success() {
                return Err(MenderError::transient(anyhow::anyhow!(
                    "log upload returned {}",
                    response.status()
                )));
            }
            Ok(())
        })
    }

    /// Submit the device's current inventory attributes.
    pub fn submit_inventory(&self, attrs: &[InventoryAttribute]) -> Result<()> {
        let url = self.url(INVENTORY_PATH)?;
        let hclient = self.hclient.clone();
        let bearer = self.bearer();
        let attrs = attrs.to_vec();

        self.runtime.block_on(async move {
            let mut req = hclient.patch(url).json(&attrs);
            if let Some(token) = bearer {
                req = req.header("Authorization", token);
            }
            let response = req
                .send()
                .await
                .map_err(|e| MenderError::transient(anyhow::anyhow!(e)))?;
            if !response.status().is_success() {
                return Err(MenderError::transient(anyhow::anyhow!(
                    "inventory submission returned {}",
                    response.status()
                )));
            }
            Ok(())
        })
    }
}
