//! Batch transmission to the metrics server.

use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tracing::debug;
use vitals_common_async::{retry, RetryError, RetryPolicy, ShutdownHandle};
use vitals_core::Metric;
use vitals_wire::{gzip, hash, HASH_HEADER};

/// Destination for aggregated batches. The dispatcher only depends on this
/// capability; the HTTP reporter is its production implementation.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Transmit one flush.
    async fn report(&self, batch: &[Metric]) -> Result<(), ReportError>;
}

/// HTTP reporter: JSON array, HMAC header over the uncompressed body, gzip,
/// POST, with transport-level retry.
pub struct Reporter {
    client: Client,
    endpoint: String,
    key: String,
    policy: RetryPolicy,
    shutdown: ShutdownHandle,
}

impl Reporter {
    /// Create a reporter posting to `endpoint`.
    pub fn new(
        client: Client,
        endpoint: String,
        key: String,
        policy: RetryPolicy,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            client,
            endpoint,
            key,
            policy,
            shutdown,
        }
    }

    async fn send(&self, body: Vec<u8>, digest: &str) -> Result<(), ReportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip")
            .header(HASH_HEADER, digest)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Status(status));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportSink for Reporter {
    async fn report(&self, batch: &[Metric]) -> Result<(), ReportError> {
        let json = serde_json::to_vec(batch)?;
        // The digest covers the uncompressed body; the receiver verifies
        // after decompression.
        let digest = hash::compute(&json, &self.key);
        let compressed = gzip::compress(&json)?;

        debug!(
            endpoint = %self.endpoint,
            metrics = batch.len(),
            bytes = compressed.len(),
            "sending report"
        );

        let result = retry(self.policy, &self.shutdown, ReportError::is_transient, || {
            self.send(compressed.clone(), &digest)
        })
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(RetryError::Permanent(e)) => Err(e),
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => Err(ReportError::Exhausted {
                attempts,
                last_error: Box::new(last_error),
            }),
            Err(RetryError::Cancelled) => Err(ReportError::Cancelled),
        }
    }
}

/// Reporting failures.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to compress batch: {0}")]
    Compress(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded {0}")]
    Status(StatusCode),

    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: Box<ReportError>,
    },

    #[error("reporting cancelled")]
    Cancelled,
}

impl ReportError {
    /// Only network-class failures are retried; a response from the server
    /// (any status) is final at this layer.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}
