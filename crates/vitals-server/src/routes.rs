//! Router assembly and the middleware chain.

use crate::handlers;
use crate::middleware::{compression, hashing, logging::LoggingLayer, retry::RetryLayer};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

/// Build the full router over `state`.
///
/// Request flow through the chain: timeout, decompress, log, verify hash,
/// retry, handler. The `/ping` route registers only when the backend can be
/// probed.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::index))
        .route("/update", post(handlers::update_json))
        .route("/update/", post(handlers::update_json))
        .route("/update/:kind/:name/:value", post(handlers::update_path))
        .route("/updates", post(handlers::update_batch))
        .route("/updates/", post(handlers::update_batch))
        .route("/value", post(handlers::value_json))
        .route("/value/", post(handlers::value_json))
        .route("/value/:kind/:name", get(handlers::value_path));

    if state.store.database().is_some() {
        router = router.route("/ping", get(handlers::ping));
    }

    // Layers run top-down for a request in the reverse order they are added:
    // the last layer added sees the request first.
    router
        .layer(RetryLayer::new(state.retry_policy, state.shutdown.clone()))
        .layer(middleware::from_fn_with_state(state.clone(), hashing::layer))
        .layer(LoggingLayer::new())
        .layer(middleware::from_fn(compression::layer))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
