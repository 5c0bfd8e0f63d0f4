//! vitals collector agent.
//!
//! Samples runtime and host metrics on a poll interval, aggregates them
//! between report ticks, and ships compressed, authenticated batches to the
//! metrics server with bounded concurrency.

mod collector;
mod config;
mod dispatcher;
mod reporter;
mod runtime_stats;

use anyhow::Context;
use clap::Parser;
use config::AgentConfig;
use reporter::Reporter;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::info;
use vitals_common_async::ShutdownHandle;
use vitals_common_http::{build_client, HttpConfig};
use vitals_common_log::LogConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AgentConfig::parse();
    config.validate().context("invalid configuration")?;

    vitals_common_log::init(LogConfig::for_environment(&config.environment))
        .context("failed to initialize logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        server = %config.address,
        "vitals agent starting"
    );

    let client = build_client(&HttpConfig::default()).context("failed to build HTTP client")?;
    let shutdown = ShutdownHandle::new();

    let (batch_tx, batch_rx) = mpsc::channel(10);
    let semaphore = Arc::new(Semaphore::new(config.rate_limit));
    let reporter = Arc::new(Reporter::new(
        client,
        config.report_url(),
        config.key.clone(),
        config.retry_policy(),
        shutdown.clone(),
    ));

    let runtime_sampler = tokio::spawn(collector::run_runtime_sampler(
        config.poll_interval(),
        batch_tx.clone(),
        shutdown.clone(),
    ));
    let system_sampler = tokio::spawn(collector::run_system_sampler(
        config.poll_interval(),
        batch_tx,
        shutdown.clone(),
    ));
    let dispatcher = tokio::spawn(dispatcher::run_dispatcher(
        batch_rx,
        config.report_interval(),
        semaphore,
        reporter,
        shutdown.clone(),
    ));

    wait_for_signal().await;
    info!("shutdown signal received");
    shutdown.shutdown();

    let _ = tokio::join!(runtime_sampler, system_sampler, dispatcher);
    info!("vitals agent stopped");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
