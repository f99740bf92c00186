//! Findings for a single request and their export formats

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::assertion::ManifestPayload;
use crate::engine::ValidationSummary;
use crate::epub::EpubPackageInfo;
use crate::{Error, Result};

/// What the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Verify,
    Sign,
    Manifest,
    Inspect,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Verify => "verify",
            Action::Sign => "sign",
            Action::Manifest => "manifest",
            Action::Inspect => "inspect",
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "verify" => Ok(Action::Verify),
            "sign" => Ok(Action::Sign),
            "manifest" => Ok(Action::Manifest),
            "inspect" => Ok(Action::Inspect),
            other => Err(Error::InvalidUpload(format!("unknown action: {}", other))),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Export format of a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Text,
}

/// Findings of one action on one uploaded file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub file_name: String,
    pub action: Action,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<EpubPackageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ManifestPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Report {
    pub fn new(file_name: impl Into<String>, action: Action) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            action,
            created_at: Utc::now(),
            validation: None,
            manifest: None,
            package: None,
            payload: None,
            signed_output: None,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// File name offered when the report is downloaded
    pub fn export_name(&self, format: ReportFormat) -> String {
        let ext = match format {
            ReportFormat::Json => "json",
            ReportFormat::Text => "txt",
        };
        format!("report_{}_{}.{}", self.file_name, self.action, ext)
    }

    pub fn export(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            ReportFormat::Text => self.render_text(),
        }
    }

    /// Plain-text summary, one section per finding
    pub fn render_text(&self) -> Result<String> {
        let mut out = String::new();
        let _ = writeln!(out, "epubseal report");
        let _ = writeln!(out, "File:    {}", self.file_name);
        let _ = writeln!(out, "Action:  {}", self.action);
        let _ = writeln!(out, "Date:    {}", self.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out, "Report:  {}", self.id);

        if let Some(err) = &self.error {
            let _ = writeln!(out, "\nError: {}", err);
        }

        if let Some(validation) = &self.validation {
            let _ = writeln!(out, "\nValidation");
            for (status, items) in validation.groups() {
                let _ = writeln!(out, "  Status {}:", status);
                for (i, item) in items.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "    {}. {}: {}",
                        i + 1,
                        item.code,
                        item.explanation.as_deref().unwrap_or("")
                    );
                }
            }
        }

        if let Some(package) = &self.package {
            let meta = &package.metadata;
            let _ = writeln!(out, "\nPackage");
            let _ = writeln!(out, "  Title:      {}", meta.title.as_deref().unwrap_or("-"));
            let _ = writeln!(out, "  Creators:   {}", meta.creators.join(", "));
            let _ = writeln!(out, "  Language:   {}", meta.language.as_deref().unwrap_or("-"));
            let _ = writeln!(out, "  Identifier: {}", meta.identifier.as_deref().unwrap_or("-"));
            let _ = writeln!(out, "  Rootfile:   {}", package.rootfile.as_deref().unwrap_or("-"));
            let _ = writeln!(out, "  Entries:    {}", package.entry_count);
            let _ = writeln!(out, "  Credential: {}", if package.has_c2pa_manifest { "present" } else { "absent" });
            for issue in &package.issues {
                let _ = writeln!(out, "  Issue: {}", issue);
            }
        }

        if let Some(payload) = &self.payload {
            if let Some(collection) = payload.collection() {
                let _ = writeln!(out, "\nEntry hashes ({})", collection.algorithm);
                for entry in &collection.entries {
                    let _ = writeln!(
                        out,
                        "  {}  {} ({}, {} bytes)",
                        hex::encode(&entry.hash),
                        entry.uri,
                        entry.format,
                        entry.size
                    );
                }
            }
            if let Some(whole) = payload.whole_file() {
                let _ = writeln!(out, "\nArchive hash: {}", hex::encode(&whole.hash));
            }
        }

        if let Some(output) = &self.signed_output {
            let _ = writeln!(out, "\nSigned output: {}", output);
        }

        if let Some(manifest) = &self.manifest {
            let _ = writeln!(out, "\nActive manifest");
            let _ = writeln!(out, "{}", serde_json::to_string_pretty(manifest)?);
        }

        Ok(out)
    }
}
