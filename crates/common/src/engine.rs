//! Manifest engine boundary
//!
//! Signing, manifest parsing and trust-chain validation happen in an external
//! engine. This module defines the seam ([`ManifestEngine`]), the shape of
//! what the engine hands back ([`ManifestStore`]) and an adapter for the
//! `c2patool` command-line engine.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::assertion::ManifestPayload;
use crate::config::SignerConfig;
use crate::{Error, Result};

/// What the engine needs to embed a new manifest
#[derive(Debug, Clone)]
pub struct SignRequest {
    /// Original archive; also recorded as the parent ingredient
    pub source: PathBuf,
    /// Where the signed archive is written
    pub output: PathBuf,
    pub payload: ManifestPayload,
}

/// External signing and verification engine
#[async_trait]
pub trait ManifestEngine: Send + Sync {
    /// Embed `request.payload` into a signed copy of `request.source`.
    async fn sign(&self, request: &SignRequest) -> Result<()>;

    /// Read and validate the manifest store embedded in `path`.
    async fn read(&self, path: &Path) -> Result<ManifestStore>;
}

/// One validation status reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Validation results of the active manifest, grouped by severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub success: Vec<ValidationStatus>,
    pub informational: Vec<ValidationStatus>,
    pub failure: Vec<ValidationStatus>,
}

impl ValidationSummary {
    pub fn is_valid(&self) -> bool {
        self.failure.is_empty()
    }

    /// Groups in display order
    pub fn groups(&self) -> [(&'static str, &[ValidationStatus]); 3] {
        [
            ("success", self.success.as_slice()),
            ("informational", self.informational.as_slice()),
            ("failure", self.failure.as_slice()),
        ]
    }
}

/// Manifest store JSON as produced by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestStore(Value);

impl ManifestStore {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self(serde_json::from_str(json)?))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn active_label(&self) -> Option<&str> {
        self.0.get("active_manifest").and_then(Value::as_str)
    }

    /// The active manifest, or an empty object when the label is missing
    pub fn active_manifest(&self) -> Value {
        self.active_label()
            .and_then(|label| self.0.get("manifests")?.get(label))
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    /// Validation results of the active manifest.
    ///
    /// Reads `validation_results.activeManifest`; stores that only carry the
    /// older flat `validation_status` list report every entry as a failure.
    pub fn validation(&self) -> ValidationSummary {
        if let Some(active) = self
            .0
            .get("validation_results")
            .and_then(|v| v.get("activeManifest"))
        {
            return ValidationSummary {
                success: statuses(active.get("success")),
                informational: statuses(active.get("informational")),
                failure: statuses(active.get("failure")),
            };
        }

        ValidationSummary {
            failure: statuses(self.0.get("validation_status")),
            ..Default::default()
        }
    }
}

fn statuses(value: Option<&Value>) -> Vec<ValidationStatus> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<ValidationStatus>(item.clone()).ok())
                .filter(|s| !s.code.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Payload keys first, in payload order, then the signer settings.
#[derive(Debug, Serialize)]
struct SigningDefinition<'a> {
    #[serde(flatten)]
    payload: &'a ManifestPayload,
    alg: &'a str,
    sign_cert: PathBuf,
    private_key: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    ta_url: Option<&'a str>,
}

/// `c2patool` command-line engine
#[derive(Debug, Clone)]
pub struct C2paTool {
    binary: PathBuf,
    signer: SignerConfig,
    timeout: Duration,
}

impl C2paTool {
    pub fn new(signer: SignerConfig) -> Self {
        Self {
            binary: signer.c2patool.clone(),
            timeout: Duration::from_secs(signer.timeout_secs),
            signer,
        }
    }

    /// Manifest definition with the signer settings merged in.
    ///
    /// c2patool resolves relative key paths against the definition file, so
    /// certificate and key paths are made absolute here.
    fn signing_definition<'a>(
        &'a self,
        payload: &'a ManifestPayload,
    ) -> Result<SigningDefinition<'a>> {
        Ok(SigningDefinition {
            payload,
            alg: &self.signer.alg,
            sign_cert: absolute(&self.signer.sign_cert)?,
            private_key: absolute(&self.signer.private_key)?,
            ta_url: self.signer.ta_url.as_deref(),
        })
    }

    async fn run(&self, args: &[&OsStr]) -> Result<String> {
        debug!("Running {} {:?}", self.binary.display(), args);

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    Error::EngineNotFound(self.binary.display().to_string())
                }
                _ => Error::Io(e),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout {
                seconds: self.timeout.as_secs(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("{} exited with {}: {}", self.binary.display(), output.status, stderr);
            return Err(Error::Engine(if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            }));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ManifestEngine for C2paTool {
    async fn sign(&self, request: &SignRequest) -> Result<()> {
        let definition = self.signing_definition(&request.payload)?;

        let mut manifest_file = tempfile::Builder::new()
            .prefix("epubseal-manifest-")
            .suffix(".json")
            .tempfile()?;
        manifest_file.write_all(serde_json::to_string(&definition)?.as_bytes())?;
        manifest_file.flush()?;

        info!(
            "Signing {} -> {}",
            request.source.display(),
            request.output.display()
        );

        self.run(&[
            request.source.as_os_str(),
            OsStr::new("--manifest"),
            manifest_file.path().as_os_str(),
            OsStr::new("--output"),
            request.output.as_os_str(),
            OsStr::new("--parent"),
            request.source.as_os_str(),
            OsStr::new("--force"),
        ])
        .await?;

        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<ManifestStore> {
        let stdout = self.run(&[path.as_os_str()]).await?;
        ManifestStore::from_json(&stdout)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| {
        Error::InvalidConfig(format!("cannot resolve {}: {}", path.display(), e))
    })
}
