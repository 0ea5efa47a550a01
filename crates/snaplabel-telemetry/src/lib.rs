//! Snaplabel Telemetry
//!
//! Counters for classification traffic. Every recording updates an
//! in-process snapshot and is forwarded to the `metrics` facade, so an
//! installed exporter (e.g. Prometheus) sees the same numbers.

pub mod metrics;

pub use crate::metrics::{describe_metrics, MetricsCollector, MetricsSnapshot};
