//! vitals metrics server.
//!
//! Ingests metric reports over HTTP into a pluggable store: in-memory with
//! disk snapshotting, or a relational backend. The per-request middleware
//! chain handles decompression, logging, body-hash verification, and
//! transient-failure replay.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use state::{AppState, Store};

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use vitals_common_async::ShutdownHandle;
use vitals_database::DatabaseStore;
use vitals_storage::{MemoryStore, SnapshotManager};

/// Server builder: constructs the storage backend and runs the HTTP server
/// to completion.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Initialize storage per the configuration. Fails fast when the
    /// relational backend is selected but unreachable.
    pub async fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let shutdown = ShutdownHandle::new();

        let store = if config.uses_database() {
            let db = DatabaseStore::new(&config.pool_config())
                .await
                .context("failed to initialize database storage")?;
            vitals_core::Pingable::ping(&db)
                .await
                .context("database unreachable at startup")?;
            info!("using relational storage");
            Store::Database(Arc::new(db))
        } else {
            let memory = Arc::new(MemoryStore::new());
            if config.restore {
                let manager = SnapshotManager::new(memory.clone(), &config.file_storage_path);
                if let Err(e) = manager.restore() {
                    error!(%e, "failed to restore snapshot");
                }
            }
            info!("using in-memory storage");
            Store::Memory(memory)
        };

        let state = AppState {
            notify_on_update: !config.uses_database() && config.sync_snapshots(),
            key: config.key.clone(),
            retry_policy: config.retry_policy(),
            shutdown,
            store,
        };

        Ok(Self { config, state })
    }

    /// Run until a termination signal, then drain, snapshot, and close.
    pub async fn run(self) -> anyhow::Result<()> {
        let Self { config, state } = self;

        let snapshot_worker = match &state.store {
            Store::Memory(memory) => {
                let manager = SnapshotManager::new(memory.clone(), &config.file_storage_path);
                if config.sync_snapshots() {
                    let updates = memory
                        .take_update_notifications()
                        .expect("notification receiver taken once");
                    Some(tokio::spawn(
                        manager.run_sync(updates, state.shutdown.clone()),
                    ))
                } else {
                    Some(tokio::spawn(
                        manager.run_periodic(config.store_interval(), state.shutdown.clone()),
                    ))
                }
            }
            Store::Database(_) => None,
        };

        let router = routes::create_router(state.clone(), config.write_timeout());
        let listener = TcpListener::bind(&config.address)
            .await
            .with_context(|| format!("failed to bind {}", config.address))?;
        info!(address = %config.address, "server listening");

        let shutdown = state.shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(signal_then_cancel(shutdown.clone()))
            .await
            .context("server error")?;

        // The signal future has fired the token; settle the workers, then
        // persist and release storage.
        shutdown.shutdown();
        if let Some(worker) = snapshot_worker {
            let _ = worker.await;
        }

        match &state.store {
            Store::Memory(memory) => {
                let manager = SnapshotManager::new(memory.clone(), &config.file_storage_path);
                if let Err(e) = manager.save() {
                    error!(%e, "final snapshot failed");
                } else {
                    info!("final snapshot written");
                }
            }
            Store::Database(db) => db.close().await,
        }

        info!("server stopped");
        Ok(())
    }
}

/// Resolve on SIGINT/SIGTERM (or an early token fire) and cancel the root
/// token, which starts graceful HTTP shutdown.
async fn signal_then_cancel(shutdown: ShutdownHandle) {
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
        _ = shutdown.cancelled() => {},
    }

    info!("shutdown signal received, starting graceful shutdown");
    shutdown.shutdown();
}
