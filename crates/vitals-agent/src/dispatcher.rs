//! Time-window aggregation with bounded outbound concurrency.

use crate::reporter::ReportSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info};
use vitals_common_async::ShutdownHandle;
use vitals_core::Metric;

/// Aggregate incoming batches and flush them on the report tick.
///
/// Incoming batches append to a buffer in arrival order. On every tick a
/// non-empty buffer is detached and handed to a spawned report worker, gated
/// by the semaphore: at most its permit count of workers run at once.
/// Cancellation exits the loop; in-flight workers run to completion and
/// release their permits on exit.
pub async fn run_dispatcher<R: ReportSink + 'static>(
    mut batches: mpsc::Receiver<Vec<Metric>>,
    report_interval: Duration,
    semaphore: Arc<Semaphore>,
    sink: Arc<R>,
    shutdown: ShutdownHandle,
) {
    let mut buffer: Vec<Metric> = Vec::new();
    let mut ticker = tokio::time::interval(report_interval);
    // The immediate first tick would flush an empty buffer.
    ticker.tick().await;

    loop {
        tokio::select! {
            received = batches.recv() => {
                match received {
                    Some(batch) => {
                        debug!(len = batch.len(), "received batch");
                        buffer.extend(batch);
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                if buffer.is_empty() {
                    continue;
                }

                let permit = tokio::select! {
                    permit = semaphore.clone().acquire_owned() => permit,
                    _ = shutdown.cancelled() => break,
                };
                let permit = match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!(%e, "failed to acquire report slot, dropping tick");
                        continue;
                    }
                };

                let flush = std::mem::take(&mut buffer);
                let sink = sink.clone();
                tokio::spawn(async move {
                    match sink.report(&flush).await {
                        Ok(()) => info!(len = flush.len(), "metrics reported"),
                        Err(e) => error!(%e, "failed to report metrics"),
                    }
                    drop(permit);
                });
            }
            _ = shutdown.cancelled() => break,
        }
    }
    info!("dispatcher stopped");
}
