//! epubseal CLI - Main Entry Point

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use epubseal_cli::commands::{hashes, inspect, manifest};
use epubseal_cli::output::{self, OutputFormat};
use epubseal_common::{C2paTool, Config};

/// epubseal - content credentials for EPUB publications
#[derive(Parser)]
#[command(name = "epubseal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, env = "EPUBSEAL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the manifest payload JSON for an EPUB
    Payload(hashes::PayloadArgs),

    /// Print per-entry and whole-file hashes
    Hashes(hashes::HashesArgs),

    /// Summarize the EPUB package structure
    Inspect(inspect::InspectArgs),

    /// Sign an EPUB with the configured engine
    Sign(manifest::SignArgs),

    /// Verify the manifest embedded in an EPUB
    Verify(manifest::VerifyArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::resolve(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Payload(args) => hashes::payload(args, &config.manifest.claim_generator).await,
        Commands::Hashes(args) => hashes::hashes(args, cli.format).await,
        Commands::Inspect(args) => inspect::execute(args, cli.format).await,
        Commands::Sign(args) => {
            let engine = C2paTool::new(config.signer.clone());
            manifest::sign(args, &engine, &config, cli.format).await
        }
        Commands::Verify(args) => {
            let engine = C2paTool::new(config.signer.clone());
            match manifest::verify(args, &engine, cli.format).await {
                Ok(true) => Ok(()),
                Ok(false) => std::process::exit(1),
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
