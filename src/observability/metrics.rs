//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `apim_operator_reconciliations_total{kind}` - Total number of reconciliations
//! - `apim_operator_reconciliation_errors_total{kind}` - Total number of reconciliation errors
//! - `apim_operator_reconciliation_duration_seconds{kind}` - Duration of reconciliations
//! - `apim_operator_requeues_total{reason}` - Requeues scheduled by reason
//! - `apim_operator_gateway_operations_total{operation}` - Successful APIM calls
//! - `apim_operator_gateway_operation_duration_seconds{operation}` - Duration of APIM calls
//! - `apim_operator_gateway_operation_errors_total{operation}` - Failed APIM calls

use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "apim_operator_reconciliations_total",
            "Total number of reconciliations by resource kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "apim_operator_reconciliation_errors_total",
            "Total number of reconciliation errors by resource kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "apim_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds by resource kind",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "apim_operator_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static GATEWAY_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "apim_operator_gateway_operations_total",
            "Total number of successful APIM operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create GATEWAY_OPERATIONS_TOTAL metric - this should never happen")
});

static GATEWAY_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "apim_operator_gateway_operation_duration_seconds",
            "Duration of APIM operations in seconds by operation",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create GATEWAY_OPERATION_DURATION metric - this should never happen")
});

static GATEWAY_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "apim_operator_gateway_operation_errors_total",
            "Total number of failed APIM operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create GATEWAY_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GATEWAY_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GATEWAY_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(GATEWAY_OPERATION_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

/// Count a scheduled requeue (`steady_state`, `operation_in_progress`, `child_wait`, `backoff`)
pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_gateway_operation(operation: &str, duration: f64) {
    GATEWAY_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
    GATEWAY_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_gateway_operation_errors(operation: &str) {
    GATEWAY_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labelled_counters_accumulate() {
        let before = REQUEUES_TOTAL.with_label_values(&["unit_test"]).get();
        increment_requeues("unit_test");
        increment_requeues("unit_test");
        assert_eq!(
            REQUEUES_TOTAL.with_label_values(&["unit_test"]).get(),
            before + 2
        );
    }
}
