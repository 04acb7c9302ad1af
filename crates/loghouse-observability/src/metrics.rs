use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Once;

static INIT: Once = Once::new();

lazy_static! {
    /// Global Prometheus metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Ingest Metrics
    // ============================================================================

    /// Finished tasks by outcome (succeeded, failed)
    pub static ref INGEST_TASKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("loghouse_ingest_tasks_total", "Total ingest tasks finished"),
        &["outcome"]
    ).expect("metric can be created");

    /// Terminal failures by error kind
    pub static ref INGEST_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("loghouse_ingest_failures_total", "Total terminal ingest failures"),
        &["kind"] // path_escape, file_size_exceeded, transient_io, task_timeout, ...
    ).expect("metric can be created");

    /// Retry attempts scheduled after transient failures
    pub static ref INGEST_RETRIES_TOTAL: IntCounter = IntCounter::new(
        "loghouse_ingest_retries_total",
        "Total write retries"
    ).expect("metric can be created");

    /// Bytes appended, newline included
    pub static ref INGEST_BYTES_TOTAL: IntCounter = IntCounter::new(
        "loghouse_ingest_bytes_total",
        "Total bytes appended to log files"
    ).expect("metric can be created");

    /// Time from acceptance to completion
    pub static ref INGEST_TASK_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("loghouse_ingest_task_seconds", "Ingest task latency in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 30.0])
    ).expect("metric can be created");

    // ============================================================================
    // Queue / Placement Metrics
    // ============================================================================

    /// Pending plus running tasks
    pub static ref QUEUE_DEPTH: IntGauge = IntGauge::new(
        "loghouse_queue_depth",
        "Ingest tasks pending or running"
    ).expect("metric can be created");

    /// Root selections by source (candidate, fallback)
    pub static ref ROOT_SELECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("loghouse_root_selections_total", "Total storage root selections"),
        &["source"]
    ).expect("metric can be created");
}

/// Register all metrics with [`REGISTRY`]. Safe to call more than once.
pub fn init() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(INGEST_TASKS_TOTAL.clone()))
            .expect("ingest_tasks_total can be registered");
        REGISTRY
            .register(Box::new(INGEST_FAILURES_TOTAL.clone()))
            .expect("ingest_failures_total can be registered");
        REGISTRY
            .register(Box::new(INGEST_RETRIES_TOTAL.clone()))
            .expect("ingest_retries_total can be registered");
        REGISTRY
            .register(Box::new(INGEST_BYTES_TOTAL.clone()))
            .expect("ingest_bytes_total can be registered");
        REGISTRY
            .register(Box::new(INGEST_TASK_SECONDS.clone()))
            .expect("ingest_task_seconds can be registered");
        REGISTRY
            .register(Box::new(QUEUE_DEPTH.clone()))
            .expect("queue_depth can be registered");
        REGISTRY
            .register(Box::new(ROOT_SELECTIONS_TOTAL.clone()))
            .expect("root_selections_total can be registered");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        init();
        init();
    }

    #[test]
    fn test_failure_counter_by_kind() {
        INGEST_FAILURES_TOTAL
            .with_label_values(&["path_escape"])
            .inc();
        assert!(INGEST_FAILURES_TOTAL.with_label_values(&["path_escape"]).get() >= 1);
    }

    #[test]
    fn test_queue_depth_gauge() {
        QUEUE_DEPTH.set(42);
        assert_eq!(QUEUE_DEPTH.get(), 42);
    }
}
