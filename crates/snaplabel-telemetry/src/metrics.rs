//! Metrics collection and reporting

use snaplabel_core::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    ::metrics::describe_counter!(
        "snaplabel_requests_total",
        "Total number of classification requests accepted"
    );
    ::metrics::describe_counter!(
        "snaplabel_failures_total",
        "Total number of failed classification requests by kind"
    );
    ::metrics::describe_histogram!(
        "snaplabel_inference_latency_us",
        ::metrics::Unit::Microseconds,
        "Decode, preprocess and inference latency in microseconds"
    );
    ::metrics::describe_counter!(
        "snaplabel_model_replacements_total",
        "Total number of models installed into the registry"
    );
}

/// Metrics collector for classification traffic
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    total_requests: AtomicU64,
    successes: AtomicU64,
    invalid_input: AtomicU64,
    model_unavailable: AtomicU64,
    inference_failures: AtomicU64,
    model_replacements: AtomicU64,
    total_latency_us: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                total_requests: AtomicU64::new(0),
                successes: AtomicU64::new(0),
                invalid_input: AtomicU64::new(0),
                model_unavailable: AtomicU64::new(0),
                inference_failures: AtomicU64::new(0),
                model_replacements: AtomicU64::new(0),
                total_latency_us: AtomicU64::new(0),
            }),
        }
    }

    /// Record an accepted request
    pub fn record_request(&self) {
        self.inner.total_requests.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("snaplabel_requests_total").increment(1);
    }

    /// Record a successful classification and its latency
    pub fn record_success(&self, latency_us: u64) {
        self.inner.successes.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
        ::metrics::histogram!("snaplabel_inference_latency_us").record(latency_us as f64);
    }

    /// Record a failed classification
    pub fn record_failure(&self, error: &Error) {
        let counter = match error {
            Error::InvalidInput(_) => &self.inner.invalid_input,
            Error::ModelUnavailable => &self.inner.model_unavailable,
            _ => &self.inner.inference_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("snaplabel_failures_total", "kind" => error.kind()).increment(1);
    }

    /// Record a model replacement
    pub fn record_model_replacement(&self) {
        self.inner.model_replacements.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("snaplabel_model_replacements_total").increment(1);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.inner.total_requests.load(Ordering::Relaxed),
            successes: self.inner.successes.load(Ordering::Relaxed),
            invalid_input: self.inner.invalid_input.load(Ordering::Relaxed),
            model_unavailable: self.inner.model_unavailable.load(Ordering::Relaxed),
            inference_failures: self.inner.inference_failures.load(Ordering::Relaxed),
            model_replacements: self.inner.model_replacements.load(Ordering::Relaxed),
            total_latency_us: self.inner.total_latency_us.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successes: u64,
    pub invalid_input: u64,
    pub model_unavailable: u64,
    pub inference_failures: u64,
    pub model_replacements: u64,
    pub total_latency_us: u64,
}

impl MetricsSnapshot {
    /// Total failed requests across all kinds
    pub fn failures(&self) -> u64 {
        self.invalid_input + self.model_unavailable + self.inference_failures
    }

    /// Average latency per successful classification
    pub fn avg_latency_us(&self) -> u64 {
        if self.successes == 0 {
            0
        } else {
            self.total_latency_us / self.successes
        }
    }

    /// Fraction of requests that failed
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.failures() as f64 / self.total_requests as f64
        }
    }
}
