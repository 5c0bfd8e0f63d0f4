//! Agent configuration from flags and environment.

use clap::Parser;
use std::time::Duration;
use vitals_common_async::RetryPolicy;
use vitals_common_http::ensure_http_scheme;

/// Collector agent configuration. Every flag has an environment-variable
/// equivalent; duration-typed values are bare integers in seconds.
#[derive(Parser, Debug, Clone)]
#[command(name = "vitals-agent", about = "Metrics collector agent", version)]
pub struct AgentConfig {
    /// Address of the metrics server.
    #[arg(short = 'a', long = "address", env = "ADDRESS", default_value = "localhost:8080")]
    pub address: String,

    /// Deployment environment: development or production.
    #[arg(short = 'e', long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Secret key for body hashing.
    #[arg(short = 'k', long, env = "KEY", default_value = "")]
    pub key: String,

    /// Interval between report flushes, in seconds.
    #[arg(short = 'r', long = "report-interval", env = "REPORT_INTERVAL", default_value_t = 10)]
    pub report_interval_secs: u64,

    /// Interval between metric polls, in seconds.
    #[arg(short = 'p', long = "poll-interval", env = "POLL_INTERVAL", default_value_t = 2)]
    pub poll_interval_secs: u64,

    /// Maximum concurrent in-flight report requests.
    #[arg(short = 'l', long = "rate-limit", env = "RATE_LIMIT", default_value_t = 2)]
    pub rate_limit: usize,

    /// Maximum attempts for a failing report.
    #[arg(long = "max-retries", env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Delay before the first retry, in seconds.
    #[arg(long = "initial-delay", env = "INITIAL_DELAY", default_value_t = 1)]
    pub initial_delay_secs: u64,

    /// Delay added after every retry, in seconds.
    #[arg(long = "delay-increment", env = "DELAY_INCREMENT", default_value_t = 1)]
    pub delay_increment_secs: u64,
}

impl AgentConfig {
    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment != "development" && self.environment != "production" {
            return Err(ConfigError::InvalidEnvironment(self.environment.clone()));
        }
        if self.rate_limit == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        Ok(())
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Report interval as a duration.
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    /// Retry policy for report requests.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            delay_increment: Duration::from_secs(self.delay_increment_secs),
        }
    }

    /// Batch ingestion endpoint on the configured server.
    pub fn report_url(&self) -> String {
        format!("{}/updates", ensure_http_scheme(&self.address))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid environment: {0}. Possible values are 'development' or 'production'")]
    InvalidEnvironment(String),

    #[error("rate limit must be at least 1")]
    ZeroRateLimit,

    #[error("max retries must be at least 1")]
    ZeroRetries,
}
