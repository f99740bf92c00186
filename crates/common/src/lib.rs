//! epubseal Common Library
//!
//! Content-hash assertions for EPUB archives, the manifest engine boundary,
//! and the configuration and report types shared by the web and CLI front-ends.

pub mod assertion;
pub mod config;
pub mod engine;
pub mod epub;
pub mod error;
pub mod report;
pub mod signing;

// Re-export commonly used types
pub use assertion::{
    build_collection_assertion, build_manifest_payload, build_whole_file_assertion,
    CollectionAssertion, EntryRecord, ManifestPayload, WholeFileAssertion,
};
pub use config::Config;
pub use engine::{C2paTool, ManifestEngine, ManifestStore, SignRequest, ValidationSummary};
pub use epub::{inspect_package, EpubPackageInfo};
pub use error::{Error, Result};
pub use report::{Action, Report, ReportFormat};

/// epubseal version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Claim generator written when none is configured
pub fn default_claim_generator() -> String {
    format!("epubseal/{}", VERSION)
}
