//! EPUB package inspection

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use epubseal_common::{inspect_package, EpubPackageInfo};

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct InspectArgs {
    /// Path to the EPUB
    pub path: PathBuf,
}

pub async fn execute(args: InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    if !args.path.exists() {
        anyhow::bail!("File not found: {}", args.path.display());
    }

    let path = args.path.clone();
    let info = tokio::task::spawn_blocking(move || inspect_package(&path)).await??;

    match format {
        OutputFormat::Json => output::print_json(&info)?,
        OutputFormat::Plain => {
            for (key, value) in summary_fields(&info) {
                println!("{}: {}", key, value);
            }
            for issue in &info.issues {
                println!("issue: {}", issue);
            }
        }
        OutputFormat::Table => print_summary(&args.path, &info),
    }

    Ok(())
}

fn summary_fields(info: &EpubPackageInfo) -> Vec<(&'static str, String)> {
    let meta = &info.metadata;
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    vec![
        ("title", opt(&meta.title)),
        ("creators", meta.creators.join(", ")),
        ("language", opt(&meta.language)),
        ("identifier", opt(&meta.identifier)),
        ("publisher", opt(&meta.publisher)),
        ("date", opt(&meta.date)),
        ("rootfile", opt(&info.rootfile)),
        ("mimetype", opt(&info.mimetype)),
        ("entries", info.entry_count.to_string()),
        ("directories", info.directory_count.to_string()),
        ("uncompressed_bytes", info.total_uncompressed_size.to_string()),
        (
            "content_credential",
            (if info.has_c2pa_manifest { "present" } else { "absent" }).to_string(),
        ),
    ]
}

fn print_summary(path: &std::path::Path, info: &EpubPackageInfo) {
    println!();
    println!("{}", "━".repeat(60).dimmed());
    println!("{}", " EPUB Package".bold());
    println!("{}", "━".repeat(60).dimmed());
    println!();
    println!("{}  {}", "📦 Input:".bold(), path.display());
    println!();

    for (key, value) in summary_fields(info) {
        println!("   {:<20} {}", key, value);
    }
    println!();

    if info.mimetype_ok && info.mimetype_first {
        println!("   Mimetype: {}", "✅ OK".green());
    } else {
        println!("   Mimetype: {}", "❌ INVALID".red());
    }

    if info.issues.is_empty() {
        output::print_success("No structural issues");
    } else {
        for issue in &info.issues {
            output::print_warning(issue);
        }
    }
}
