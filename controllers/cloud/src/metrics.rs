//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `cloudops_reconciliations_total{kind}` - Reconcile passes started
//! - `cloudops_reconcile_errors_total{kind}` - Passes that could not record their outcome
//! - `cloudops_requeues_total{kind,reason}` - Requeue decisions (`short`, `long`, `immediate`, `never`, `backoff`)

use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("cloudops_reconciliations_total", "Total number of reconcile passes by kind"),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILE_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cloudops_reconcile_errors_total",
            "Total number of reconcile passes that returned an error, by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILE_ERRORS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("cloudops_requeues_total", "Total number of requeue decisions by kind and reason"),
        &["kind", "reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

/// Register all metrics with the registry served on `/metrics`
pub fn register_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    Ok(())
}

/// Count a reconcile pass of `kind`
pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

/// Count a pass of `kind` that returned an error
pub fn increment_reconcile_errors(kind: &str) {
    RECONCILE_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

/// Count a requeue of `kind`, labelled by `reason`
pub fn increment_requeues(kind: &str, reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[kind, reason]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_labelled_by_kind() {
        let before = RECONCILIATIONS_TOTAL.with_label_values(&["MetricsTestKind"]).get();
        increment_reconciliations("MetricsTestKind");
        increment_reconciliations("MetricsTestKind");
        assert_eq!(RECONCILIATIONS_TOTAL.with_label_values(&["MetricsTestKind"]).get(), before + 2);

        increment_requeues("MetricsTestKind", "short");
        assert_eq!(REQUEUES_TOTAL.with_label_values(&["MetricsTestKind", "short"]).get(), 1);
        assert_eq!(REQUEUES_TOTAL.with_label_values(&["MetricsTestKind", "long"]).get(), 0);
    }
}
