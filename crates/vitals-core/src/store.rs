//! Storage interface shared by the in-memory and relational backends.

use crate::metric::{Metric, MetricKind};
use async_trait::async_trait;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested metric does not exist.
    #[error("{kind} {name} not found")]
    NotFound { kind: MetricKind, name: String },

    /// A record that violates the metric invariant was submitted.
    #[error("invalid metric: {0}")]
    InvalidMetric(String),

    /// Backend failure that may succeed on retry (pool timeout, I/O, lock).
    #[error("transient storage error: {0}")]
    Transient(String),

    /// Non-recoverable backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Not-found constructor.
    pub fn not_found(kind: MetricKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Whether retrying the operation could help.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Capability set of a metric store.
///
/// `notify` requests an update notification where the backend supports one;
/// backends without a notification stream ignore it.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Replace the value of a gauge.
    async fn update_gauge(&self, name: &str, value: f64, notify: bool) -> StoreResult<()>;

    /// Add `delta` to a counter, creating it at zero first if absent.
    async fn update_counter(&self, name: &str, delta: i64, notify: bool) -> StoreResult<()>;

    /// Read a gauge.
    async fn get_gauge(&self, name: &str) -> StoreResult<f64>;

    /// Read a counter.
    async fn get_counter(&self, name: &str) -> StoreResult<i64>;

    /// Apply a batch of records. Gauge rows replace, counter rows add.
    async fn save_batch(&self, metrics: &[Metric], notify: bool) -> StoreResult<()>;

    /// Plain-text dump of the store, counters then gauges, each sorted by
    /// name.
    async fn describe(&self) -> StoreResult<String>;
}

/// Optional liveness capability, satisfied by backends with an external
/// connection to probe.
#[async_trait]
pub trait Pingable: Send + Sync {
    /// Probe the backend connection.
    async fn ping(&self) -> StoreResult<()>;
}

/// Render the describe dump from sorted name/value pairs.
///
/// Both backends produce the same shape: a counters section followed by a
/// gauges section.
pub fn render_describe(
    counters: impl IntoIterator<Item = (String, i64)>,
    gauges: impl IntoIterator<Item = (String, f64)>,
) -> String {
    let mut out = String::from("Counter values:\n");
    for (name, value) in counters {
        out.push_str(&format!("{name}: {value}\n"));
    }
    out.push_str("\nGauge values:\n");
    for (name, value) in gauges {
        out.push_str(&format!("{name}: {value}\n"));
    }
    out
}
