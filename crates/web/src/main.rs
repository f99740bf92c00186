use std::path::PathBuf;

use tracing::info;

use epubseal_common::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // EPUBSEAL_CONFIG points at an optional TOML file; EPUBSEAL_* variables
    // override whatever it sets.
    let config_path = std::env::var("EPUBSEAL_CONFIG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    let config = Config::resolve(config_path.as_deref())?;

    info!(
        "Starting epubseal web on http://{} (engine: {})",
        config.server.listen,
        config.signer.c2patool.display()
    );

    epubseal_web::server::serve(config).await
}
