//! Core types for the vitals telemetry pipeline.
//!
//! This crate defines the wire-level metric record shared by the agent and
//! the server, and the [`MetricStore`] capability trait implemented by the
//! storage backends.

#![warn(clippy::all)]

pub mod metric;
pub mod store;

pub use metric::{format_gauge, InvalidMetric, Metric, MetricKind, MetricPayload};
pub use store::{render_describe, MetricStore, Pingable, StoreError, StoreResult};
