//! scrip daemon — entry point for running a mint.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use scrip_node::{init_logging, LogFormat, MintConfig, MintNode};

#[derive(Parser)]
#[command(name = "scripd", about = "scrip mint daemon")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "SCRIP_CONFIG")]
    config: Option<PathBuf>,

    /// Public host other mints use to reach this one.
    /// Required unless a config file provides it.
    #[arg(long, env = "SCRIP_HOST")]
    host: Option<String>,

    /// Port to listen on.
    #[arg(long, env = "SCRIP_PORT")]
    port: Option<u16>,

    /// Disable TLS for mint-to-mint calls (development only).
    #[arg(long, env = "SCRIP_NO_TLS")]
    no_tls: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "SCRIP_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "SCRIP_LOG_FORMAT")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MintConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            let host = cli
                .host
                .clone()
                .context("--host (or SCRIP_HOST) is required without a config file")?;
            toml::from_str::<MintConfig>(&format!("host = {host:?}"))
                .context("building default configuration")?
        }
    };
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.no_tls {
        config.use_tls = false;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }

    init_logging(LogFormat::from_name(&config.log_format), &config.log_level);
    info!(host = %config.host, "scrip mint starting");

    let node = MintNode::new(config)?;
    node.run().await?;
    Ok(())
}
