//! Thread-safe in-memory store.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tokio::sync::mpsc;
use vitals_core::{
    render_describe, Metric, MetricKind, MetricPayload, MetricStore, StoreError, StoreResult,
};

/// Both metric tables, guarded by one mutex.
#[derive(Debug, Default)]
struct Tables {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

/// In-memory implementation of [`MetricStore`].
///
/// All operations serialize on a single mutex; none of them hold it across
/// an await point. Mutations with `notify` publish onto a coalescing
/// capacity-1 channel consumed by the snapshot worker; when the channel is
/// full the signal is dropped.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    notify_tx: mpsc::Sender<()>,
    notify_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (notify_tx, notify_rx) = mpsc::channel(1);
        Self {
            tables: Mutex::new(Tables::default()),
            notify_tx,
            notify_rx: Mutex::new(Some(notify_rx)),
        }
    }

    /// Take the update-notification receiver. Yields `Some` exactly once.
    pub fn take_update_notifications(&self) -> Option<mpsc::Receiver<()>> {
        self.notify_rx.lock().expect("notify receiver lock").take()
    }

    /// Deep copies of both tables.
    pub fn snapshot(&self) -> (HashMap<String, f64>, HashMap<String, i64>) {
        let tables = self.lock();
        (tables.gauges.clone(), tables.counters.clone())
    }

    /// Replace both tables wholesale. Used by restore-on-startup.
    pub fn replace_all(&self, gauges: HashMap<String, f64>, counters: HashMap<String, i64>) {
        let mut tables = self.lock();
        tables.gauges = gauges;
        tables.counters = counters;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("metric tables lock")
    }

    fn publish_update(&self, notify: bool) {
        if notify {
            // Coalescing: a full channel means a save is already pending.
            let _ = self.notify_tx.try_send(());
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn update_gauge(&self, name: &str, value: f64, notify: bool) -> StoreResult<()> {
        self.lock().gauges.insert(name.to_string(), value);
        self.publish_update(notify);
        Ok(())
    }

    async fn update_counter(&self, name: &str, delta: i64, notify: bool) -> StoreResult<()> {
        *self.lock().counters.entry(name.to_string()).or_insert(0) += delta;
        self.publish_update(notify);
        Ok(())
    }

    async fn get_gauge(&self, name: &str) -> StoreResult<f64> {
        self.lock()
            .gauges
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::not_found(MetricKind::Gauge, name))
    }

    async fn get_counter(&self, name: &str) -> StoreResult<i64> {
        self.lock()
            .counters
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::not_found(MetricKind::Counter, name))
    }

    async fn save_batch(&self, metrics: &[Metric], notify: bool) -> StoreResult<()> {
        // Validate up front so the batch applies all-or-nothing under one
        // critical section.
        let mut rows = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let payload = metric
                .payload()
                .map_err(|e| StoreError::InvalidMetric(e.to_string()))?;
            rows.push((metric.id.as_str(), payload));
        }

        let mut tables = self.lock();
        for (name, payload) in rows {
            match payload {
                MetricPayload::Gauge(v) => {
                    tables.gauges.insert(name.to_string(), v);
                }
                MetricPayload::Counter(d) => {
                    *tables.counters.entry(name.to_string()).or_insert(0) += d;
                }
            }
        }
        drop(tables);

        self.publish_update(notify);
        Ok(())
    }

    async fn describe(&self) -> StoreResult<String> {
        let (gauges, counters) = self.snapshot();
        let counters: BTreeMap<_, _> = counters.into_iter().collect();
        let gauges: BTreeMap<_, _> = gauges.into_iter().collect();
        Ok(render_describe(counters, gauges))
    }
}
