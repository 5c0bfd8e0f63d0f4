//! vitals server binary.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use vitals_common_log::LogConfig;
use vitals_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::parse();
    config.validate().context("invalid configuration")?;

    vitals_common_log::init(LogConfig::for_environment(&config.environment))
        .context("failed to initialize logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "vitals server starting"
    );

    let server = Server::new(config).await?;
    server.run().await?;

    info!("server shutdown complete");
    Ok(())
}
