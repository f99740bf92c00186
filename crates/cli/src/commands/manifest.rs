//! Sign and verify through the manifest engine

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use tracing::debug;

use epubseal_common::{signing, Config, ManifestEngine};

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct SignArgs {
    /// Path to the EPUB to sign
    pub path: PathBuf,

    /// Where to write the signed copy (default: output_<name> next to the source)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Path to the signed EPUB
    pub path: PathBuf,
}

/// Default destination of `epubseal sign`
pub fn default_output(source: &std::path::Path) -> anyhow::Result<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("not a file: {}", source.display()))?;
    Ok(source.with_file_name(signing::output_file_name(&name.to_string_lossy())))
}

pub async fn sign(
    args: SignArgs,
    engine: &dyn ManifestEngine,
    config: &Config,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let output_path = match args.output {
        Some(path) => path,
        None => default_output(&args.path)?,
    };

    debug!("Signing {} -> {}", args.path.display(), output_path.display());
    let outcome = signing::sign_to(
        engine,
        &args.path,
        &output_path,
        &config.manifest.claim_generator,
    )
    .await?;

    match format {
        OutputFormat::Json => output::print_json(&outcome)?,
        _ => {
            output::print_success(&format!("Signed {}", outcome.output.display()));
            output::print_validation(&outcome.validation);
        }
    }

    Ok(())
}

/// Returns whether the manifest validated without failures.
pub async fn verify(
    args: VerifyArgs,
    engine: &dyn ManifestEngine,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    debug!("Reading manifest store of {}", args.path.display());
    let store = engine.read(&args.path).await?;
    let validation = store.validation();

    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "path": args.path,
            "active_manifest": store.active_label(),
            "validation": validation,
        }))?,
        _ => {
            println!(
                "{} {}",
                "Active manifest:".bold(),
                store.active_label().unwrap_or("none")
            );
            output::print_validation(&validation);
        }
    }

    Ok(validation.is_valid())
}
