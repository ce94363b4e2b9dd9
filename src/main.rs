//! al-uploader - Main entry point
//!
//! Builds Adventure Land character scripts and uploads the bundles that
//! changed since the last build.

use al_uploader::api::ApiClient;
use al_uploader::upload::Uploader;
use al_uploader::{build, config::Config, logging, watch};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long in-flight uploads get to land before the process exits.
const UPLOAD_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "al-uploader.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Keep running: rebuild and upload whenever the sources change
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    logging::init(log_level);

    tracing::info!(
        "Starting al-uploader v{} ({} script(s) -> {})",
        env!("CARGO_PKG_VERSION"),
        config.scripts.len(),
        config.api.base_url
    );

    // Without the auth token there is nothing useful to do.
    let secret = config.load_secret()?;
    let client = ApiClient::new(config.api.base_url.clone(), &secret);
    let mut uploader = Uploader::new(client);

    if args.watch {
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C, shutting down");
                signal.cancel();
            }
        });

        watch::run(&config, &mut uploader, shutdown).await;
    } else {
        let bundles = build::build_all(&config).await;
        if bundles.is_empty() {
            bail!("no bundle built successfully");
        }
        uploader.process_bundles(&bundles, &config);
    }

    // Let outstanding uploads finish before the runtime goes away
    uploader.wait_idle(UPLOAD_GRACE).await;

    Ok(())
}
