//! Hash and payload commands
//!
//! Both run the assertion builder locally; no engine is involved.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Args;
use serde::Serialize;

use epubseal_common::assertion::{
    build_collection_assertion, build_whole_file_assertion, EntryRecord,
};
use epubseal_common::signing;

use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct PayloadArgs {
    /// Path to the EPUB
    pub path: PathBuf,

    /// Claim generator id (defaults to the configured one)
    #[arg(long)]
    pub generator: Option<String>,
}

#[derive(Args)]
pub struct HashesArgs {
    /// Path to the EPUB
    pub path: PathBuf,
}

/// One collection entry as printed
#[derive(Debug, Serialize)]
pub struct HashRow {
    pub uri: String,
    pub format: String,
    pub size: u64,
    pub sha256: String,
}

impl From<&EntryRecord> for HashRow {
    fn from(record: &EntryRecord) -> Self {
        Self {
            uri: record.uri.clone(),
            format: record.format.clone(),
            size: record.size,
            sha256: STANDARD.encode(&record.hash),
        }
    }
}

impl TableDisplay for HashRow {
    fn headers() -> Vec<&'static str> {
        vec!["URI", "Format", "Size", "SHA-256 (base64)"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.uri.clone(),
            self.format.clone(),
            self.size.to_string(),
            self.sha256.clone(),
        ]
    }
}

pub async fn payload(args: PayloadArgs, default_generator: &str) -> anyhow::Result<()> {
    let generator = args.generator.as_deref().unwrap_or(default_generator);
    let payload = signing::build_payload(&args.path, generator).await?;
    println!("{}", payload.to_json()?);
    Ok(())
}

pub async fn hashes(args: HashesArgs, format: OutputFormat) -> anyhow::Result<()> {
    let path = args.path.clone();
    let (collection, whole_file) = tokio::task::spawn_blocking(move || {
        let collection = build_collection_assertion(&path)?;
        let whole_file = build_whole_file_assertion(&path)?;
        Ok::<_, epubseal_common::Error>((collection, whole_file))
    })
    .await??;

    let rows: Vec<HashRow> = collection.entries.iter().map(HashRow::from).collect();
    let file_hash = STANDARD.encode(&whole_file.hash);

    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "path": args.path,
            "alg": collection.algorithm,
            "entries": rows,
            "file": { "alg": whole_file.algorithm, "hash": file_hash },
        }))?,
        _ => {
            output::print_list(&rows, format)?;
            println!();
            println!("Whole file ({}): {}", whole_file.algorithm, file_hash);
        }
    }

    Ok(())
}
