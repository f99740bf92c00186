//! epubseal CLI
//!
//! Command-line front end for building content-hash payloads, inspecting
//! EPUB packages, and signing or verifying them through the manifest engine.

pub mod commands;
pub mod output;
