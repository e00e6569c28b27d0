//! Observability infrastructure for the prognosis service
//!
//! Provides:
//! - Prometheus metrics (prediction latency, per-path counts, fallbacks, model info)
//! - Structured JSON logging with tracing

use crate::loader::ArtifactInfo;
use crate::models::ScoredBy;
use crate::state::ServingMode;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Row-count buckets for batch uploads
const BATCH_ROW_BUCKETS: &[f64] = &[1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 20000.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AppMetricsInner> = OnceLock::new();

struct AppMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions: IntCounterVec,
    model_fallbacks: IntCounterVec,
    slow_inferences: IntCounter,
    rejected_requests: IntCounterVec,
    batch_rows: Histogram,
    model_loaded: IntGauge,
    model_loaded_timestamp: IntGauge,
    model_info: GaugeVec,
}

impl AppMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "prognosis_prediction_latency_seconds",
                "Time spent serving a prediction request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions: register_int_counter_vec!(
                "prognosis_predictions_total",
                "Patients scored, by inference path",
                &["path"]
            )
            .expect("Failed to register predictions_total"),

            model_fallbacks: register_int_counter_vec!(
                "prognosis_model_fallbacks_total",
                "Requests re-served by the heuristic after a model failure",
                &["endpoint"]
            )
            .expect("Failed to register model_fallbacks_total"),

            slow_inferences: register_int_counter!(
                "prognosis_slow_inferences_total",
                "Model inferences slower than the per-row latency target"
            )
            .expect("Failed to register slow_inferences_total"),

            rejected_requests: register_int_counter_vec!(
                "prognosis_rejected_requests_total",
                "Requests rejected for client input errors",
                &["reason"]
            )
            .expect("Failed to register rejected_requests_total"),

            batch_rows: register_histogram!(
                "prognosis_batch_rows",
                "Rows per batch upload",
                BATCH_ROW_BUCKETS.to_vec()
            )
            .expect("Failed to register batch_rows"),

            model_loaded: register_int_gauge!(
                "prognosis_model_loaded",
                "1 when a trained artifact is serving, 0 in lite mode"
            )
            .expect("Failed to register model_loaded"),

            model_loaded_timestamp: register_int_gauge!(
                "prognosis_model_loaded_timestamp_seconds",
                "Unix time the serving artifact was loaded, 0 in lite mode"
            )
            .expect("Failed to register model_loaded_timestamp_seconds"),

            model_info: register_gauge_vec!(
                "prognosis_model_info",
                "Information about the loaded artifact",
                &["name", "checksum", "size_bytes", "input_width"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AppMetrics {
    _private: (),
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AppMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AppMetrics")
    }
}

impl AppMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AppMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AppMetricsInner {
        GLOBAL_METRICS.get_or_init(AppMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, scored_by: ScoredBy, count: u64) {
        self.inner()
            .predictions
            .with_label_values(&[scored_by.as_str()])
            .inc_by(count);
    }

    pub fn inc_fallbacks(&self, endpoint: &str) {
        self.inner()
            .model_fallbacks
            .with_label_values(&[endpoint])
            .inc();
    }

    pub fn inc_slow_inferences(&self) {
        self.inner().slow_inferences.inc();
    }

    pub fn inc_rejected(&self, reason: &str) {
        self.inner()
            .rejected_requests
            .with_label_values(&[reason])
            .inc();
    }

    pub fn observe_batch_rows(&self, rows: usize) {
        self.inner().batch_rows.observe(rows as f64);
    }

    /// Record the startup decision
    pub fn set_model_state(&self, artifact: Option<&ArtifactInfo>) {
        let inner = self.inner();
        inner.model_info.reset();
        match artifact {
            Some(artifact) => {
                let name = artifact.path.display().to_string();
                let size_bytes = artifact.size_bytes.to_string();
                let input_width = artifact.input_width.to_string();
                inner.model_loaded.set(1);
                inner.model_loaded_timestamp.set(artifact.loaded_at);
                inner
                    .model_info
                    .with_label_values(&[
                        name.as_str(),
                        artifact.checksum.as_str(),
                        size_bytes.as_str(),
                        input_width.as_str(),
                    ])
                    .set(1.0);
            }
            None => {
                inner.model_loaded.set(0);
                inner.model_loaded_timestamp.set(0);
            }
        }
    }
}

/// Structured logger for service events
///
/// Provides consistent JSON-formatted logging for startup, model loading,
/// fallbacks, and batch scoring.
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, mode: ServingMode) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            mode = %mode.as_str(),
            "Prognosis service started"
        );
    }

    pub fn log_model_loaded(&self, artifact: &ArtifactInfo) {
        info!(
            event = "model_loaded",
            service = %self.service,
            path = %artifact.path.display(),
            checksum = %artifact.checksum,
            size_bytes = artifact.size_bytes,
            input_width = artifact.input_width,
            "Trained model loaded, serving in full mode"
        );
    }

    pub fn log_model_unavailable(&self, path: &str, reason: &str) {
        warn!(
            event = "model_unavailable",
            service = %self.service,
            path = %path,
            reason = %reason,
            "No trained model, serving in lite mode"
        );
    }

    /// The heuristic replaced a failed model call for a whole request
    pub fn log_fallback(&self, endpoint: &str, error: &str) {
        warn!(
            event = "model_fallback",
            service = %self.service,
            endpoint = %endpoint,
            error = %error,
            "Model inference failed, re-serving request with heuristic"
        );
    }

    pub fn log_batch_scored(&self, rows: usize, scored_by: ScoredBy, elapsed_ms: u128) {
        info!(
            event = "batch_scored",
            service = %self.service,
            rows = rows,
            path = %scored_by.as_str(),
            elapsed_ms = elapsed_ms,
            "Batch scored"
        );
    }

    pub fn log_rejected(&self, endpoint: &str, reason: &str) {
        info!(
            event = "request_rejected",
            service = %self.service,
            endpoint = %endpoint,
            reason = %reason,
            "Rejected client input"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Prognosis service shutting down"
        );
    }
}
