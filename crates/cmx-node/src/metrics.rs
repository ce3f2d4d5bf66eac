use prometheus::{Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Selection
    pub selections_total: IntCounter,
    pub selection_failures: IntCounter,
    pub epochs_total: IntCounter,

    // Validation
    pub validations_passed: IntCounter,
    pub validations_failed: IntCounter,
    pub samples_verified: IntCounter,
    pub jobs_slashed: IntCounter,

    // Market state
    pub current_price: Gauge,
    pub registered_workers: IntGauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let selections_total =
            IntCounter::new("cmx_selections_total", "Total successful worker selections")?;
        let selection_failures = IntCounter::new(
            "cmx_selection_no_eligible_total",
            "Selections that found no eligible worker",
        )?;
        let epochs_total =
            IntCounter::new("cmx_epochs_total", "Epoch quota resets performed")?;

        let validations_passed =
            IntCounter::new("cmx_validations_passed_total", "Proofs that passed validation")?;
        let validations_failed =
            IntCounter::new("cmx_validations_failed_total", "Proofs that failed validation")?;
        let samples_verified = IntCounter::new(
            "cmx_samples_verified_total",
            "Individual samples verified against committed roots",
        )?;
        let jobs_slashed =
            IntCounter::new("cmx_jobs_slashed_total", "Jobs with proven invalid output")?;

        let current_price = Gauge::new("cmx_current_price", "Current posted base price")?;
        let registered_workers =
            IntGauge::new("cmx_registered_workers", "Workers in the registry")?;

        registry.register(Box::new(selections_total.clone()))?;
        registry.register(Box::new(selection_failures.clone()))?;
        registry.register(Box::new(epochs_total.clone()))?;
        registry.register(Box::new(validations_passed.clone()))?;
        registry.register(Box::new(validations_failed.clone()))?;
        registry.register(Box::new(samples_verified.clone()))?;
        registry.register(Box::new(jobs_slashed.clone()))?;
        registry.register(Box::new(current_price.clone()))?;
        registry.register(Box::new(registered_workers.clone()))?;

        Ok(Self {
            registry,
            selections_total,
            selection_failures,
            epochs_total,
            validations_passed,
            validations_failed,
            samples_verified,
            jobs_slashed,
            current_price,
            registered_workers,
        })
    }

    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_gather() {
        let m = Metrics::new().unwrap();
        m.selections_total.inc();
        m.validations_passed.inc_by(2);
        m.current_price.set(1.25);

        let text = m.gather();
        assert!(text.contains("cmx_selections_total 1"));
        assert!(text.contains("cmx_validations_passed_total 2"));
        assert!(text.contains("cmx_current_price 1.25"));
    }

    #[test]
    fn test_all_metrics_registered() {
        let text = Metrics::new().unwrap().gather();
        for name in [
            "cmx_selections_total",
            "cmx_selection_no_eligible_total",
            "cmx_epochs_total",
            "cmx_validations_passed_total",
            "cmx_validations_failed_total",
            "cmx_samples_verified_total",
            "cmx_jobs_slashed_total",
            "cmx_current_price",
            "cmx_registered_workers",
        ] {
            assert!(text.contains(name), "missing {}", name);
        }
    }
}
