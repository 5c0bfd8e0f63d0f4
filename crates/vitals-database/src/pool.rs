//! Connection pool construction.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Pool parameters, fixed at construction.
#[derive(Debug, Clone)]
pub struct DatabasePoolConfig {
    /// Database DSN (`sqlite:` URL or bare file path).
    pub dsn: String,
    /// Maximum open connections.
    pub max_open_conns: u32,
    /// Connections kept warm when idle.
    pub max_idle_conns: u32,
    /// Maximum lifetime of a pooled connection.
    pub conn_max_lifetime: Duration,
}

impl DatabasePoolConfig {
    /// Config for an in-memory database, used by tests.
    pub fn in_memory() -> Self {
        Self {
            dsn: "sqlite::memory:".to_string(),
            max_open_conns: 1,
            max_idle_conns: 1,
            conn_max_lifetime: Duration::from_secs(300),
        }
    }
}

/// Open a pool with the configured limits.
pub async fn connect(config: &DatabasePoolConfig) -> Result<SqlitePool, sqlx::Error> {
    let dsn = if config.dsn.starts_with("sqlite:") {
        config.dsn.clone()
    } else {
        format!("sqlite:{}", config.dsn)
    };

    let options = SqliteConnectOptions::from_str(&dsn)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_open_conns)
        .min_connections(config.max_idle_conns.min(config.max_open_conns))
        .max_lifetime(Some(config.conn_max_lifetime))
        .connect_with(options)
        .await?;

    info!(
        max_open = config.max_open_conns,
        "database pool created"
    );
    Ok(pool)
}
