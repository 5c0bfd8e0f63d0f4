//! Logging infrastructure for the vitals binaries.

#![warn(clippy::all)]

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Logging configuration derived from the deployment environment.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    /// Minimum log level.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// Human-readable format for development.
    #[default]
    Pretty,
    /// JSON structured format for production.
    Json,
}

impl LogConfig {
    /// Map a deployment environment to its logging profile: `development`
    /// gets pretty debug output, `production` gets JSON at info.
    pub fn for_environment(environment: &str) -> Self {
        match environment {
            "production" => Self {
                level: LogLevel::Info,
                format: LogFormat::Json,
            },
            _ => Self {
                level: LogLevel::Debug,
                format: LogFormat::Pretty,
            },
        }
    }
}

/// Initialize the global subscriber. `RUST_LOG` overrides the config level.
pub fn init(config: LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_ansi(true).with_target(true))
            .try_init()
            .map_err(|e| LogError::Init(e.to_string()))?,
        LogFormat::Json => registry
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| LogError::Init(e.to_string()))?,
    }

    Ok(())
}

/// Logging errors.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to initialize logging: {0}")]
    Init(String),
}

pub use tracing::{debug, error, info, trace, warn};
