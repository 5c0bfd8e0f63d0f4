//! Sampling loops feeding the dispatcher.

use crate::runtime_stats::RuntimeSampler;
use std::time::Duration;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use vitals_common_async::ShutdownHandle;
use vitals_core::Metric;

/// Runtime sampling loop: every tick emits one batch with the poll counter,
/// a fresh random gauge, and the full runtime catalogue.
pub async fn run_runtime_sampler(
    poll_interval: Duration,
    batches: mpsc::Sender<Vec<Metric>>,
    shutdown: ShutdownHandle,
) {
    let mut sampler = match RuntimeSampler::new() {
        Ok(sampler) => sampler,
        Err(e) => {
            error!(%e, "runtime sampler unavailable");
            return;
        }
    };

    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut batch = Vec::with_capacity(29);
                batch.push(Metric::counter("PollCount", 1));
                batch.push(Metric::gauge("RandomValue", rand::random::<f64>()));
                for (name, value) in sampler.sample() {
                    batch.push(Metric::gauge(name, value));
                }

                debug!(len = batch.len(), "collected runtime metrics");
                if batches.send(batch).await.is_err() {
                    break;
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
    info!("runtime sampler stopped");
}

/// System sampling loop: every tick emits total/free physical memory and one
/// utilization gauge per logical CPU. Readings that are unavailable on a
/// given tick are skipped; the rest of the batch still ships.
pub async fn run_system_sampler(
    poll_interval: Duration,
    batches: mpsc::Sender<Vec<Metric>>,
    shutdown: ShutdownHandle,
) {
    let mut sys = System::new_with_specifics(
        RefreshKind::new()
            .with_cpu(CpuRefreshKind::new().with_cpu_usage())
            .with_memory(MemoryRefreshKind::new().with_ram()),
    );

    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sys.refresh_memory();
                sys.refresh_cpu_usage();

                let mut batch = Vec::new();
                if sys.total_memory() > 0 {
                    batch.push(Metric::gauge("TotalMemory", sys.total_memory() as f64));
                    batch.push(Metric::gauge("FreeMemory", sys.free_memory() as f64));
                }
                for (i, cpu) in sys.cpus().iter().enumerate() {
                    batch.push(Metric::gauge(
                        format!("CPUutilization{i}"),
                        f64::from(cpu.cpu_usage()),
                    ));
                }

                if batch.is_empty() {
                    continue;
                }
                debug!(len = batch.len(), "collected system metrics");
                if batches.send(batch).await.is_err() {
                    break;
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
    info!("system sampler stopped");
}
