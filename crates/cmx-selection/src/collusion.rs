use cmx_types::{Job, Worker};

/// Extension point for penalizing over-concentration of selections by
/// organization or network origin.
///
/// The returned factor multiplies a worker's fairness score; 1.0 leaves it
/// untouched. Implementations needing epoch-wide state (e.g. selections per
/// ASN) hold it themselves.
pub trait CollusionPolicy: Send + Sync {
    fn adjustment(&self, worker: &Worker, job: &Job) -> f64;
}

/// Leaves every score unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralCollusionPolicy;

impl CollusionPolicy for NeutralCollusionPolicy {
    fn adjustment(&self, _worker: &Worker, _job: &Job) -> f64 {
        1.0
    }
}
