//! epubseal configuration
//!
//! Loaded from a TOML file (defaults when the file is absent), then
//! overridden by `EPUBSEAL_*` environment variables.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub signer: SignerConfig,
    pub manifest: ManifestConfig,
}

/// Web server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub listen: SocketAddr,

    /// Maximum accepted upload body in bytes
    pub max_upload_bytes: usize,

    /// Number of reports kept for export
    pub report_capacity: usize,

    /// Seconds a report stays exportable
    pub report_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_upload_bytes: 64 * 1024 * 1024,
            report_capacity: 256,
            report_ttl_secs: 60 * 60,
        }
    }
}

/// Upload and output directories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
        }
    }
}

/// Signing credentials and engine location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Signing algorithm understood by the engine
    pub alg: String,

    /// PEM certificate chain
    pub sign_cert: PathBuf,

    /// PEM private key
    pub private_key: PathBuf,

    /// RFC 3161 timestamp authority
    pub ta_url: Option<String>,

    /// Path to the c2patool binary
    pub c2patool: PathBuf,

    /// Engine invocation timeout
    pub timeout_secs: u64,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            alg: "ps256".to_string(),
            sign_cert: PathBuf::from("cert/ps256.pub"),
            private_key: PathBuf::from("cert/ps256.pem"),
            ta_url: Some("http://timestamp.digicert.com".to_string()),
            c2patool: PathBuf::from("c2patool"),
            timeout_secs: 120,
        }
    }
}

/// Manifest settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// `claim_generator` written into every payload
    pub claim_generator: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            claim_generator: crate::default_claim_generator(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)
                .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `path` when given, apply environment overrides, validate.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `EPUBSEAL_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key).and_then(|v| {
                let v = v.trim().to_string();
                if v.is_empty() { None } else { Some(v) }
            })
        };

        if let Some(v) = var("EPUBSEAL_WEB_ADDR") {
            self.server.listen = v
                .parse()
                .map_err(|e| Error::InvalidConfig(format!("EPUBSEAL_WEB_ADDR: {}", e)))?;
        }
        if let Some(v) = var("EPUBSEAL_MAX_UPLOAD_BYTES") {
            self.server.max_upload_bytes = v
                .parse()
                .map_err(|e| Error::InvalidConfig(format!("EPUBSEAL_MAX_UPLOAD_BYTES: {}", e)))?;
        }
        if let Some(v) = var("EPUBSEAL_UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = var("EPUBSEAL_OUTPUT_DIR") {
            self.storage.output_dir = PathBuf::from(v);
        }
        if let Some(v) = var("EPUBSEAL_SIGN_CERT") {
            self.signer.sign_cert = PathBuf::from(v);
        }
        if let Some(v) = var("EPUBSEAL_PRIVATE_KEY") {
            self.signer.private_key = PathBuf::from(v);
        }
        if let Some(v) = var("EPUBSEAL_SIGNING_ALG") {
            self.signer.alg = v;
        }
        if let Some(v) = var("EPUBSEAL_TA_URL") {
            self.signer.ta_url = Some(v);
        }
        if let Some(v) = var("EPUBSEAL_C2PATOOL") {
            self.signer.c2patool = PathBuf::from(v);
        }
        if let Some(v) = var("EPUBSEAL_CLAIM_GENERATOR") {
            self.manifest.claim_generator = v;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.signer.alg.trim().is_empty() {
            return Err(Error::InvalidConfig("signer.alg must not be empty".to_string()));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(Error::InvalidConfig(
                "server.max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.manifest.claim_generator.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "manifest.claim_generator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
