//! Server configuration from flags and environment.

use clap::{ArgAction, Parser};
use std::time::Duration;
use vitals_common_async::RetryPolicy;
use vitals_database::DatabasePoolConfig;

/// Metrics server configuration. Every flag has an environment-variable
/// equivalent; duration-typed values are bare integers in seconds.
#[derive(Parser, Debug, Clone)]
#[command(name = "vitals-server", about = "Metrics ingestion server", version)]
pub struct ServerConfig {
    /// Address and port to listen on.
    #[arg(short = 'a', long = "address", env = "ADDRESS", default_value = "0.0.0.0:8080")]
    pub address: String,

    /// Deployment environment: development or production.
    #[arg(short = 'e', long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Secret key for body hash verification and response signing.
    #[arg(short = 'k', long, env = "KEY", default_value = "")]
    pub key: String,

    /// Snapshot file path for the in-memory backend.
    #[arg(
        short = 'f',
        long = "file-storage-path",
        env = "FILE_STORAGE_PATH",
        default_value = "/tmp/metrics-db.json"
    )]
    pub file_storage_path: String,

    /// Database DSN. Empty selects the in-memory backend.
    #[arg(short = 'd', long = "database-dsn", env = "DATABASE_DSN", default_value = "")]
    pub database_dsn: String,

    /// Restore the in-memory store from the snapshot file on startup.
    #[arg(
        long = "restore",
        env = "RESTORE",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub restore: bool,

    /// Snapshot interval in seconds; 0 writes synchronously on every update.
    #[arg(short = 'i', long = "store-interval", env = "STORE_INTERVAL", default_value_t = 300)]
    pub store_interval_secs: u64,

    /// Read timeout, in seconds.
    #[arg(long = "read-timeout", env = "READ_TIMEOUT", default_value_t = 5)]
    pub read_timeout_secs: u64,

    /// Write timeout, in seconds.
    #[arg(long = "write-timeout", env = "WRITE_TIMEOUT", default_value_t = 10)]
    pub write_timeout_secs: u64,

    /// Idle connection timeout, in seconds.
    #[arg(long = "idle-timeout", env = "IDLE_TIMEOUT", default_value_t = 15)]
    pub idle_timeout_secs: u64,

    /// Maximum attempts for the retry middleware.
    #[arg(long = "max-retries", env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Delay before the first retry, in seconds.
    #[arg(long = "initial-delay", env = "INITIAL_DELAY", default_value_t = 1)]
    pub initial_delay_secs: u64,

    /// Delay added after every retry, in seconds.
    #[arg(long = "delay-increment", env = "DELAY_INCREMENT", default_value_t = 1)]
    pub delay_increment_secs: u64,

    /// Maximum open database connections.
    #[arg(long = "max-open-conns", env = "MAX_OPEN_CONNS", default_value_t = 25)]
    pub max_open_conns: u32,

    /// Database connections kept warm when idle.
    #[arg(long = "max-idle-conns", env = "MAX_IDLE_CONNS", default_value_t = 25)]
    pub max_idle_conns: u32,

    /// Maximum lifetime of a pooled connection, in seconds.
    #[arg(long = "conn-max-lifetime", env = "CONN_MAX_LIFETIME", default_value_t = 300)]
    pub conn_max_lifetime_secs: u64,
}

impl ServerConfig {
    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment != "development" && self.environment != "production" {
            return Err(ConfigError::InvalidEnvironment(self.environment.clone()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        Ok(())
    }

    /// Whether the relational backend is selected.
    pub fn uses_database(&self) -> bool {
        !self.database_dsn.is_empty()
    }

    /// Whether snapshots are written synchronously on every update.
    pub fn sync_snapshots(&self) -> bool {
        self.store_interval_secs == 0
    }

    /// Snapshot interval as a duration.
    pub fn store_interval(&self) -> Duration {
        Duration::from_secs(self.store_interval_secs)
    }

    /// Per-request timeout enforced by the server.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Retry policy for the retry middleware.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            delay_increment: Duration::from_secs(self.delay_increment_secs),
        }
    }

    /// Pool parameters for the relational backend.
    pub fn pool_config(&self) -> DatabasePoolConfig {
        DatabasePoolConfig {
            dsn: self.database_dsn.clone(),
            max_open_conns: self.max_open_conns,
            max_idle_conns: self.max_idle_conns,
            conn_max_lifetime: Duration::from_secs(self.conn_max_lifetime_secs),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid environment: {0}. Possible values are 'development' or 'production'")]
    InvalidEnvironment(String),

    #[error("max retries must be at least 1")]
    ZeroRetries,
}
