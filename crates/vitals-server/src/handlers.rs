//! Request handlers for the metrics endpoints.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use serde::Deserialize;
use vitals_core::{format_gauge, Metric, MetricKind, MetricPayload, Pingable};

/// Apply one validated metric and read back the stored record.
async fn apply_metric(state: &AppState, metric: &Metric) -> ApiResult<Metric> {
    let payload = metric
        .payload()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let store = state.store.metrics();
    let notify = state.notify_on_update;

    match payload {
        MetricPayload::Gauge(value) => {
            store.update_gauge(&metric.id, value, notify).await?;
            let stored = store.get_gauge(&metric.id).await?;
            Ok(Metric::gauge(metric.id.clone(), stored))
        }
        MetricPayload::Counter(delta) => {
            store.update_counter(&metric.id, delta, notify).await?;
            let stored = store.get_counter(&metric.id).await?;
            Ok(Metric::counter(metric.id.clone(), stored))
        }
    }
}

/// `POST /update/` — single metric as a JSON body; echoes the stored record.
pub async fn update_json(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Metric>> {
    let metric: Metric = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed metric: {e}")))?;
    let stored = apply_metric(&state, &metric).await?;
    Ok(Json(stored))
}

/// `POST /update/{type}/{name}/{value}` — path-parameter form; empty 200 on
/// success.
pub async fn update_path(
    State(state): State<AppState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    let kind: MetricKind = kind
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid metric type: {kind}")))?;

    let metric = match kind {
        MetricKind::Gauge => {
            let value: f64 = value
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("invalid gauge value: {value}")))?;
            Metric::gauge(name, value)
        }
        MetricKind::Counter => {
            let delta: i64 = value
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("invalid counter delta: {value}")))?;
            Metric::counter(name, delta)
        }
    };

    apply_metric(&state, &metric).await?;
    Ok(StatusCode::OK)
}

/// `POST /updates/` — JSON array of metric records, applied as one batch.
pub async fn update_batch(State(state): State<AppState>, body: Bytes) -> ApiResult<StatusCode> {
    let metrics: Vec<Metric> = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed batch: {e}")))?;

    for metric in &metrics {
        metric
            .payload()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }

    state
        .store
        .metrics()
        .save_batch(&metrics, state.notify_on_update)
        .await?;
    Ok(StatusCode::OK)
}

/// Read request body: name and kind only.
#[derive(Debug, Deserialize)]
struct MetricQuery {
    id: String,
    #[serde(rename = "type")]
    kind: MetricKind,
}

/// `POST /value/` — JSON read; responds with the full stored record.
pub async fn value_json(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Metric>> {
    let query: MetricQuery = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed query: {e}")))?;

    let store = state.store.metrics();
    let record = match query.kind {
        MetricKind::Gauge => Metric::gauge(query.id.clone(), store.get_gauge(&query.id).await?),
        MetricKind::Counter => {
            Metric::counter(query.id.clone(), store.get_counter(&query.id).await?)
        }
    };
    Ok(Json(record))
}

/// `GET /value/{type}/{name}` — plain-text read.
pub async fn value_path(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult<String> {
    let kind: MetricKind = kind
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid metric type: {kind}")))?;

    let store = state.store.metrics();
    let body = match kind {
        MetricKind::Gauge => format_gauge(store.get_gauge(&name).await?),
        MetricKind::Counter => store.get_counter(&name).await?.to_string(),
    };
    Ok(body)
}

/// `GET /` — HTML dump of every stored metric.
pub async fn index(State(state): State<AppState>) -> ApiResult<Html<String>> {
    let listing = state.store.metrics().describe().await?;
    let page = format!(
        "<html><head><title>Metrics</title>\
         <style>body {{ background-color: black; color: white; \
         font-size: 1.2rem; line-height: 1.5rem }}</style>\
         </head><body><pre>{}</pre></body></html>",
        escape_html(&listing)
    );
    Ok(Html(page))
}

/// `GET /ping` — relational backend liveness. Registered only when the
/// backend is the database.
pub async fn ping(State(state): State<AppState>) -> ApiResult<Response> {
    let db = state
        .store
        .database()
        .ok_or_else(|| ApiError::Internal("ping without database backend".into()))?;
    db.ping().await?;
    Ok((StatusCode::OK, "OK").into_response())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&#34;")
        .replace('\'', "&#39;")
}
