use crate::collusion::{CollusionPolicy, NeutralCollusionPolicy};
use crate::config::SelectionConfig;
use crate::error::{Result, SelectionError};
use crate::scoring::{self, WorkerScore};
use chrono::Utc;
use cmx_registry::{RegistryError, WorkerRegistry};
use cmx_types::{Job, Seed, Worker, WorkerId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Domain tag for the exploration generator, kept distinct from the
/// challenge generator that consumes raw seed bytes.
const EXPLORATION_DOMAIN: &[u8] = b"cmx/selection/exploration/v1";

/// Auto-selection router.
///
/// Filters the registry snapshot down to eligible workers, ranks them by
/// suitability × performance × fairness, and picks one of the top-K either
/// by ε-greedy newcomer exploration or by seed-weighted lottery. All
/// randomness comes from the caller's seed.
pub struct WorkerSelector {
    registry: Arc<WorkerRegistry>,
    config: SelectionConfig,
    collusion_policy: Arc<dyn CollusionPolicy>,
}

impl WorkerSelector {
    pub fn new(registry: Arc<WorkerRegistry>, config: SelectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            config,
            collusion_policy: Arc::new(NeutralCollusionPolicy),
        })
    }

    /// Replace the neutral anti-collusion policy
    pub fn with_collusion_policy(mut self, policy: Arc<dyn CollusionPolicy>) -> Self {
        self.collusion_policy = policy;
        self
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn is_eligible(&self, worker: &Worker, job: &Job) -> bool {
        scoring::is_eligible(worker, job, &self.config)
    }

    pub fn score_worker(&self, worker: &Worker, job: &Job) -> WorkerScore {
        let suitability = scoring::suitability(worker, job);
        let performance = scoring::performance(worker, &self.config, Utc::now());
        let mut fairness = scoring::fairness(worker, &self.config);
        if self.config.anti_collusion_enabled {
            fairness *= self.collusion_policy.adjustment(worker, job);
        }

        WorkerScore {
            worker: worker.id,
            suitability,
            performance,
            fairness,
            total: suitability * performance * fairness,
            is_newcomer: worker.is_newcomer,
        }
    }

    /// Top-K eligible workers for `job`, best first. Empty when nobody
    /// qualifies.
    pub async fn rank_candidates(&self, job: &Job) -> Vec<WorkerScore> {
        let snapshot = self.registry.snapshot().await;
        self.rank(&snapshot, job)
    }

    /// Assign `job` to a worker and charge that worker's epoch quota
    pub async fn select_worker(&self, job: &Job, seed: &Seed) -> Result<WorkerId> {
        let snapshot = self.registry.snapshot().await;
        let candidates = self.rank(&snapshot, job);
        if candidates.is_empty() {
            warn!(
                job_id = %job.id,
                registered = snapshot.len(),
                "❌ No eligible workers for job"
            );
            return Err(SelectionError::NoEligibleWorkers);
        }

        let mut rng = exploration_rng(job, seed);
        let explored = self.explore(&candidates, &mut rng);
        let (selected, explored) = match explored {
            Some(score) => (score, true),
            None => (weighted_pick(&candidates, seed), false),
        };

        self.commit_quota(&selected.worker).await?;

        info!(
            job_id = %job.id,
            worker = %selected.worker.short(),
            score = selected.total,
            candidates = candidates.len(),
            explored,
            "🎯 Worker selected"
        );

        Ok(selected.worker)
    }

    fn rank(&self, snapshot: &[Worker], job: &Job) -> Vec<WorkerScore> {
        let mut scored: Vec<WorkerScore> = snapshot
            .iter()
            .filter(|w| self.is_eligible(w, job))
            .map(|w| self.score_worker(w, job))
            .collect();

        // Stable, so equal scores keep registry (id) order
        scored.sort_by(|a, b| b.total.total_cmp(&a.total));
        scored.truncate(self.config.top_k);
        scored
    }

    fn explore(&self, candidates: &[WorkerScore], rng: &mut ChaCha20Rng) -> Option<WorkerScore> {
        if rng.gen::<f64>() >= self.config.exploration_rate {
            return None;
        }
        let newcomers: Vec<&WorkerScore> = candidates.iter().filter(|c| c.is_newcomer).collect();
        if newcomers.is_empty() {
            return None;
        }
        let pick = newcomers[rng.gen_range(0..newcomers.len())].clone();
        debug!(
            worker = %pick.worker.short(),
            newcomers = newcomers.len(),
            "Exploration picked a newcomer"
        );
        Some(pick)
    }

    async fn commit_quota(&self, id: &WorkerId) -> Result<()> {
        let total = self.registry.len().await.max(1);
        match self.registry.increment_quota(id, 1.0 / total as f64).await {
            Ok(_) => Ok(()),
            // Deregistered between snapshot and commit; nothing left to charge
            Err(RegistryError::WorkerNotFound(_)) => {
                warn!(worker = %id.short(), "Selected worker left the registry before quota commit");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn exploration_rng(job: &Job, seed: &Seed) -> ChaCha20Rng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(EXPLORATION_DOMAIN);
    hasher.update(seed.as_bytes());
    hasher.update(job.id.as_bytes());
    ChaCha20Rng::from_seed(*hasher.finalize().as_bytes())
}

/// Seed-weighted lottery over candidates in rank order
fn weighted_pick(candidates: &[WorkerScore], seed: &Seed) -> WorkerScore {
    let total_weight: f64 = candidates.iter().map(|c| c.total).sum();
    let threshold = seed.unit_interval() * total_weight;

    let mut cumulative = 0.0;
    for candidate in candidates {
        cumulative += candidate.total;
        if cumulative >= threshold {
            return candidate.clone();
        }
    }
    candidates[0].clone()
}
