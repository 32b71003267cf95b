// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Application Gateway ingress controller.
//!
//! All metrics share the namespace prefix `appgw_ingress_controller_`.
//!
//! # Metrics Categories
//!
//! - **Reconcile Metrics** - Outcome and duration of each reconcile cycle
//! - **Gateway Metrics** - ARM GET and PUT calls and their results
//! - **Event Bus Metrics** - Admitted and dropped events, queue depth
//! - **Error Metrics** - Coded controller errors and PFX conversion failures
//!
//! # Example
//!
//! ```rust,no_run
//! use appgw_ingress::metrics::record_reconcile;
//!
//! record_reconcile("applied", std::time::Duration::from_secs(1));
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all controller metrics
const METRICS_NAMESPACE: &str = "appgw_ingress_controller";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconcile Metrics
// ============================================================================

/// Total number of reconcile cycles by outcome
///
/// Labels:
/// - `outcome`: `applied`, `unchanged`, `skipped` or `error`
pub static RECONCILE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciles_total"),
        "Total number of reconcile cycles by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconcile cycles in seconds
///
/// Labels:
/// - `outcome`: same values as [`RECONCILE_TOTAL`]
pub static RECONCILE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconcile_duration_seconds"),
        "Duration of reconcile cycles in seconds by outcome",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]);
    let histogram = HistogramVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Ingresses removed by the pruner
///
/// Labels:
/// - `reason`: event reason attached to the prune
pub static INGRESSES_PRUNED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_ingresses_pruned_total"),
        "Total number of ingresses dropped by the pruner by reason",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Gateway Metrics
// ============================================================================

/// Gateway updates issued against ARM
///
/// Labels:
/// - `result`: `success` or `failure`
pub static ARM_UPDATES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_arm_updates_total"),
        "Total number of Application Gateway updates by result",
    );
    let counter = CounterVec::new(opts, &["result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Gateway fetches issued against ARM
///
/// Labels:
/// - `result`: `success` or `failure`
pub static ARM_GETS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_arm_gets_total"),
        "Total number of Application Gateway fetches by result",
    );
    let counter = CounterVec::new(opts, &["result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of gateway updates in seconds
pub static ARM_UPDATE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_arm_update_duration_seconds"),
        "Duration of Application Gateway updates in seconds",
    )
    .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]);
    let histogram = HistogramVec::new(opts, &["result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Event Bus Metrics
// ============================================================================

/// Events admitted onto the bus
///
/// Labels:
/// - `kind`: `Create`, `Update`, `Delete` or `PeriodicReconcile`
/// - `resource`: observed resource kind
pub static EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_events_total"),
        "Total number of events admitted onto the work queue",
    );
    let counter = CounterVec::new(opts, &["kind", "resource"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Events discarded before or on the bus
///
/// Labels:
/// - `reason`: `overflow`, `unreferenced`, `ignored_namespace`, `unchanged` or `closed`
pub static EVENTS_DROPPED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_events_dropped_total"),
        "Total number of events dropped by reason",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of events waiting on the bus
pub static EVENT_QUEUE_DEPTH: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_event_queue_depth"),
        "Number of events waiting on the work queue",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Coded controller errors
///
/// Labels:
/// - `code`: stable error code (e.g. `NoDefaults`, `GatewayForbidden`)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of controller errors by code",
    );
    let counter = CounterVec::new(opts, &["code"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// TLS secrets that could not be packaged as PFX
///
/// Labels:
/// - `code`: `UnknownSecretType`, `MalformedSecret` or `ExportingError`
pub static PFX_CONVERSION_FAILURES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_pfx_conversion_failures_total"),
        "Total number of TLS secrets that failed PFX conversion",
    );
    let counter = CounterVec::new(opts, &["code"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a finished reconcile cycle
///
/// # Arguments
/// * `outcome` - `applied`, `unchanged`, `skipped` or `error`
/// * `duration` - Wall time of the cycle
pub fn record_reconcile(outcome: &str, duration: Duration) {
    RECONCILE_TOTAL.with_label_values(&[outcome]).inc();
    RECONCILE_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

/// Record a gateway update
///
/// # Arguments
/// * `success` - Whether ARM accepted the update
/// * `duration` - Time spent waiting for completion
pub fn record_arm_update(success: bool, duration: Duration) {
    let result = if success { "success" } else { "failure" };
    ARM_UPDATES_TOTAL.with_label_values(&[result]).inc();
    ARM_UPDATE_DURATION_SECONDS
        .with_label_values(&[result])
        .observe(duration.as_secs_f64());
}

/// Record a gateway fetch
pub fn record_arm_get(success: bool) {
    let result = if success { "success" } else { "failure" };
    ARM_GETS_TOTAL.with_label_values(&[result]).inc();
}

/// Record an event admitted onto the bus
pub fn record_event_admitted(kind: &str, resource: &str) {
    EVENTS_TOTAL.with_label_values(&[kind, resource]).inc();
}

/// Record a dropped event
pub fn record_event_dropped(reason: &str) {
    EVENTS_DROPPED_TOTAL.with_label_values(&[reason]).inc();
}

/// Publish the current queue depth
#[allow(clippy::cast_precision_loss)]
pub fn set_event_queue_depth(depth: usize) {
    EVENT_QUEUE_DEPTH.set(depth as f64);
}

/// Record a coded controller error
pub fn record_error(code: &str) {
    ERRORS_TOTAL.with_label_values(&[code]).inc();
}

/// Record a failed PFX conversion
pub fn record_pfx_failure(code: &str) {
    PFX_CONVERSION_FAILURES_TOTAL
        .with_label_values(&[code])
        .inc();
}

/// Record an ingress dropped by the pruner
pub fn record_ingress_pruned(reason: &str) {
    INGRESSES_PRUNED_TOTAL.with_label_values(&[reason]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
