//! epubseal Web Console
//!
//! Upload form for verifying, signing and inspecting EPUB content credentials,
//! with per-request report export.

pub mod page;
pub mod reports;
pub mod server;
pub mod upload;

pub use reports::ReportStore;
pub use server::WebServer;
