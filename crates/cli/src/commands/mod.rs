//! CLI Commands

pub mod hashes;
pub mod inspect;
pub mod manifest;
