//! Error types for epubseal

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the epubseal Error
pub type Result<T> = std::result::Result<T, Error>;

/// epubseal error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The file could not be opened or parsed as a ZIP archive.
    #[error("Cannot read archive {path}: {reason}")]
    ArchiveRead { path: PathBuf, reason: String },

    /// A single archive entry could not be opened or decompressed.
    #[error("Cannot read archive entry {entry}: {reason}")]
    EntryRead { entry: String, reason: String },

    /// The raw file could not be read in full.
    #[error("Cannot read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest engine error: {0}")]
    Engine(String),

    #[error("Manifest engine not found: {0}")]
    EngineNotFound(String),

    #[error("Operation timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn archive(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Error::ArchiveRead {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn entry(entry: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::EntryRead {
            entry: entry.into(),
            reason: err.to_string(),
        }
    }

    /// Short machine-readable kind, used in reports and CLI JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::ArchiveRead { .. } => "archive_read",
            Error::EntryRead { .. } => "entry_read",
            Error::FileRead { .. } => "file_read",
            Error::Engine(_) => "engine",
            Error::EngineNotFound(_) => "engine_not_found",
            Error::Timeout { .. } => "timeout",
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidUpload(_) => "invalid_upload",
            Error::NotFound { .. } => "not_found",
            Error::Internal(_) => "internal",
        }
    }
}
