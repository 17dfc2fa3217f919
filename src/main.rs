//! Party - multipart/form-data upload receiver
//!
//! Runs the upload server and logs every extracted file.

use clap::Parser;
use party::{config::Config, server::UploadServer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Party - receive multipart/form-data uploads under a body size ceiling
#[derive(Parser, Debug)]
#[command(name = "party")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log filter, e.g. `info` or `party=debug,hyper=warn` (RUST_LOG wins when set)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(directives: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directives))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!(version = party::VERSION, "Starting Party");

    let config = Config::load(&args.config)?;
    info!(path = %args.config.display(), address = %config.server.address, "Configuration loaded");

    UploadServer::new(config)
        .await?
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::try_parse_from(["party"]).unwrap();
        assert_eq!(args.config, PathBuf::from("config.yaml"));
        assert!(EnvFilter::try_new(&args.log_level).is_ok());
    }

    #[test]
    fn test_log_filter_directives() {
        let args = Args::try_parse_from(["party", "-l", "party=debug,hyper=warn"]).unwrap();
        assert!(EnvFilter::try_new(&args.log_level).is_ok());
        assert!(EnvFilter::try_new("party=loud").is_err());
    }
}
