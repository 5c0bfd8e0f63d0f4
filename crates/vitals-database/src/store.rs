//! sqlx-backed implementation of the metric store.

use crate::pool::{connect, DatabasePoolConfig};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::info;
use vitals_core::{
    render_describe, Metric, MetricKind, MetricPayload, MetricStore, Pingable, StoreError,
    StoreResult,
};

const UPSERT_GAUGE: &str = "INSERT INTO gauges (name, value) VALUES (?1, ?2) \
     ON CONFLICT(name) DO UPDATE SET value = excluded.value";

// Counters accumulate on conflict.
const UPSERT_COUNTER: &str = "INSERT INTO counters (name, value) VALUES (?1, ?2) \
     ON CONFLICT(name) DO UPDATE SET value = counters.value + excluded.value";

/// Relational implementation of [`MetricStore`].
///
/// Persists independently of process lifetime; the update-notification flag
/// of the storage interface has no effect here.
pub struct DatabaseStore {
    pool: SqlitePool,
}

impl DatabaseStore {
    /// Open the pool and create the schema idempotently.
    pub async fn new(config: &DatabasePoolConfig) -> StoreResult<Self> {
        let pool = connect(config).await.map_err(map_sqlx_error)?;
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS gauges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                value DOUBLE PRECISION NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS counters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                value BIGINT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    /// Close the pool. Called exactly once during shutdown.
    pub async fn close(&self) {
        info!("closing database pool");
        self.pool.close().await;
    }
}

#[async_trait]
impl MetricStore for DatabaseStore {
    async fn update_gauge(&self, name: &str, value: f64, _notify: bool) -> StoreResult<()> {
        sqlx::query(UPSERT_GAUGE)
            .bind(name)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_counter(&self, name: &str, delta: i64, _notify: bool) -> StoreResult<()> {
        sqlx::query(UPSERT_COUNTER)
            .bind(name)
            .bind(delta)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_gauge(&self, name: &str) -> StoreResult<f64> {
        sqlx::query_scalar("SELECT value FROM gauges WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| StoreError::not_found(MetricKind::Gauge, name))
    }

    async fn get_counter(&self, name: &str) -> StoreResult<i64> {
        sqlx::query_scalar("SELECT value FROM counters WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| StoreError::not_found(MetricKind::Counter, name))
    }

    async fn save_batch(&self, metrics: &[Metric], _notify: bool) -> StoreResult<()> {
        let mut rows = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let payload = metric
                .payload()
                .map_err(|e| StoreError::InvalidMetric(e.to_string()))?;
            rows.push((metric.id.as_str(), payload));
        }

        // One transaction: either all rows land or none. The transaction
        // rolls back on drop if any statement fails.
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for (name, payload) in rows {
            match payload {
                MetricPayload::Gauge(value) => {
                    sqlx::query(UPSERT_GAUGE)
                        .bind(name)
                        .bind(value)
                        .execute(&mut *tx)
                        .await
                        .map_err(map_sqlx_error)?;
                }
                MetricPayload::Counter(delta) => {
                    sqlx::query(UPSERT_COUNTER)
                        .bind(name)
                        .bind(delta)
                        .execute(&mut *tx)
                        .await
                        .map_err(map_sqlx_error)?;
                }
            }
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn describe(&self) -> StoreResult<String> {
        let counters = sqlx::query("SELECT name, value FROM counters ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(|row| (row.get::<String, _>("name"), row.get::<i64, _>("value")))
            .collect::<Vec<_>>();

        let gauges = sqlx::query("SELECT name, value FROM gauges ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(|row| (row.get::<String, _>("name"), row.get::<f64, _>("value")))
            .collect::<Vec<_>>();

        Ok(render_describe(counters, gauges))
    }
}

#[async_trait]
impl Pingable for DatabaseStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

/// Classify sqlx failures into the shared store error taxonomy.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => StoreError::Transient(err.to_string()),
        sqlx::Error::Database(ref db) if is_locked(db.as_ref()) => {
            StoreError::Transient(err.to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

fn is_locked(err: &dyn sqlx::error::DatabaseError) -> bool {
    // SQLITE_BUSY / SQLITE_LOCKED surface as these codes.
    matches!(err.code().as_deref(), Some("5") | Some("6"))
}
