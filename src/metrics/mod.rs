//! Prometheus metrics for the nuri pipeline and dispatcher
//!
//! This module provides metrics tracking for:
//! - Pipeline: status transitions, duplicate screening outcomes
//! - Dispatcher: publish attempts per platform, failed jobs, sweep duration
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};
use std::sync::OnceLock;

use crate::models::{ContentStatus, Platform};

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for pipeline metrics
struct PipelineMetrics {
    status_transitions: CounterVec,
    duplicate_checks: CounterVec,
}

/// Container for dispatcher metrics
struct DispatchMetrics {
    publish_attempts: CounterVec,
    jobs_failed: Counter,
    sweep_duration: Histogram,
}

/// Global storage for pipeline metrics
static PIPELINE_METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

/// Global storage for dispatcher metrics
static DISPATCH_METRICS: OnceLock<DispatchMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, subsequent metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = nuri::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let pipeline = PipelineMetrics {
        status_transitions: register_counter_vec!(
            "nuri_pipeline_status_transitions_total",
            "Content status transitions by source and target status",
            &["from", "to"]
        )?,
        duplicate_checks: register_counter_vec!(
            "nuri_pipeline_duplicate_checks_total",
            "Duplicate checks by outcome (exact, near, clean)",
            &["outcome"]
        )?,
    };

    let dispatch = DispatchMetrics {
        publish_attempts: register_counter_vec!(
            "nuri_dispatch_publish_attempts_total",
            "Publish attempts by platform and outcome",
            &["platform", "outcome"]
        )?,
        jobs_failed: register_counter!(
            "nuri_dispatch_jobs_failed_total",
            "Scheduled jobs that exhausted their retries"
        )?,
        sweep_duration: register_histogram!(
            "nuri_dispatch_sweep_duration_seconds",
            "Time spent processing one due-job sweep",
            vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
        )?,
    };

    PIPELINE_METRICS
        .set(pipeline)
        .map_err(|_| "Pipeline metrics already initialized")?;
    DISPATCH_METRICS
        .set(dispatch)
        .map_err(|_| "Dispatch metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    PIPELINE_METRICS.get().is_some() && DISPATCH_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a content status transition
pub fn record_status_transition(from: ContentStatus, to: ContentStatus) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.status_transitions
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
    }
}

/// Outcome label of a duplicate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateOutcome {
    Exact,
    Near,
    Clean,
}

impl DuplicateOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Near => "near",
            Self::Clean => "clean",
        }
    }
}

/// Record a duplicate check result
pub fn record_duplicate_check(outcome: DuplicateOutcome) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.duplicate_checks
            .with_label_values(&[outcome.as_str()])
            .inc();
    }
}

/// Record a publish attempt; `outcome` is `success`, `failed` or `skipped`
pub fn record_publish_attempt(platform: Platform, outcome: &str) {
    if let Some(m) = DISPATCH_METRICS.get() {
        m.publish_attempts
            .with_label_values(&[platform.label(), outcome])
            .inc();
    }
}

/// Record a job that moved to FAILED
pub fn record_job_failed() {
    if let Some(m) = DISPATCH_METRICS.get() {
        m.jobs_failed.inc();
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a sweep timer (records when the handle is dropped)
pub fn start_sweep_timer() -> MetricsTimer {
    match DISPATCH_METRICS.get() {
        Some(m) => MetricsTimer::new(m.sweep_duration.start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
