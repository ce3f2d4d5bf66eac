use crate::error::{RegistryError, Result};
use chrono::Utc;
use cmx_types::{Worker, WorkerId, WorkerStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Completed jobs after which a worker stops counting as a newcomer
    pub newcomer_job_threshold: u64,
    /// Weight of the newest sample in the latency moving average
    pub latency_ewma_weight: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            newcomer_job_threshold: 10,
            latency_ewma_weight: 0.3,
        }
    }
}

/// In-memory directory of workers keyed by identity.
///
/// The outer lock guards membership; each worker sits behind its own lock so
/// quota bumps and performance reports on one worker never block readers of
/// another.
pub struct WorkerRegistry {
    workers: RwLock<HashMap<WorkerId, Arc<RwLock<Worker>>>>,
    config: RegistryConfig,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl WorkerRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            workers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Insert or replace a worker
    pub async fn register(&self, worker: Worker) {
        let id = worker.id;
        let status = worker.status;
        let mut workers = self.workers.write().await;
        let replaced = workers
            .insert(id, Arc::new(RwLock::new(worker)))
            .is_some();

        info!(
            worker = %id.short(),
            status = ?status,
            replaced,
            total_workers = workers.len(),
            "📝 Worker registered"
        );
    }

    /// Remove a worker; returns false if it was not registered
    pub async fn remove(&self, id: &WorkerId) -> bool {
        let mut workers = self.workers.write().await;
        let removed = workers.remove(id).is_some();
        if removed {
            info!(
                worker = %id.short(),
                total_workers = workers.len(),
                "🗑️ Worker removed"
            );
        }
        removed
    }

    /// Zero every worker's quota. Called once per epoch boundary.
    pub async fn reset_epoch_quotas(&self) {
        let workers = self.workers.read().await;
        for entry in workers.values() {
            entry.write().await.quota_used = 0.0;
        }
        info!(total_workers = workers.len(), "🔄 Epoch quotas reset");
    }

    pub async fn len(&self) -> usize {
        self.workers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workers.read().await.is_empty()
    }

    pub async fn contains(&self, id: &WorkerId) -> bool {
        self.workers.read().await.contains_key(id)
    }

    pub async fn get(&self, id: &WorkerId) -> Option<Worker> {
        let entry = self.entry(id).await?;
        let worker = entry.read().await.clone();
        Some(worker)
    }

    /// Point-in-time copy of all workers, ordered by identity
    pub async fn snapshot(&self) -> Vec<Worker> {
        let workers = self.workers.read().await;
        let mut out = Vec::with_capacity(workers.len());
        for entry in workers.values() {
            out.push(entry.read().await.clone());
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Charge a selection against a worker's epoch quota and mark it active.
    ///
    /// Quota only grows within an epoch and saturates at 1.0. Returns the
    /// updated quota.
    pub async fn increment_quota(&self, id: &WorkerId, amount: f64) -> Result<f64> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(RegistryError::InvalidQuotaIncrement(amount));
        }

        let entry = self
            .entry(id)
            .await
            .ok_or(RegistryError::WorkerNotFound(*id))?;
        let mut worker = entry.write().await;
        worker.quota_used = (worker.quota_used + amount).min(1.0);
        worker.last_active_at = Utc::now();

        debug!(
            worker = %id.short(),
            amount,
            quota_used = worker.quota_used,
            "Quota charged"
        );

        Ok(worker.quota_used)
    }

    /// Fold one validation outcome into a worker's performance record
    pub async fn record_validation(
        &self,
        id: &WorkerId,
        passed: bool,
        latency_secs: Option<f64>,
    ) -> Result<()> {
        let entry = self
            .entry(id)
            .await
            .ok_or(RegistryError::WorkerNotFound(*id))?;
        let mut worker = entry.write().await;
        let perf = &mut worker.performance;

        if let Some(latency) = latency_secs.filter(|l| l.is_finite() && *l >= 0.0) {
            perf.avg_latency_secs = if perf.total_jobs == 0 {
                latency
            } else {
                let w = self.config.latency_ewma_weight;
                (1.0 - w) * perf.avg_latency_secs + w * latency
            };
        }

        perf.total_jobs += 1;
        if passed {
            perf.successful_jobs += 1;
        } else {
            perf.failed_jobs += 1;
        }
        perf.pass_rate = perf.successful_jobs as f64 / perf.total_jobs as f64;
        perf.last_updated = Some(Utc::now());

        let total_jobs = perf.total_jobs;
        let pass_rate = perf.pass_rate;
        if worker.is_newcomer && total_jobs >= self.config.newcomer_job_threshold {
            worker.is_newcomer = false;
            info!(worker = %id.short(), total_jobs, "🎓 Worker graduated from newcomer status");
        }

        debug!(
            worker = %id.short(),
            passed,
            total_jobs,
            pass_rate,
            "Validation outcome recorded"
        );

        Ok(())
    }

    /// Availability report from monitoring; non-finite readings are ignored
    pub async fn report_availability(
        &self,
        id: &WorkerId,
        da_reliability: f64,
        uptime: f64,
    ) -> Result<()> {
        let entry = self
            .entry(id)
            .await
            .ok_or(RegistryError::WorkerNotFound(*id))?;
        let mut worker = entry.write().await;
        if da_reliability.is_finite() {
            worker.performance.da_reliability = da_reliability.clamp(0.0, 1.0);
        }
        if uptime.is_finite() {
            worker.performance.uptime = uptime.clamp(0.0, 1.0);
        }
        worker.performance.last_updated = Some(Utc::now());
        Ok(())
    }

    pub async fn set_status(&self, id: &WorkerId, status: WorkerStatus) -> Result<()> {
        let entry = self
            .entry(id)
            .await
            .ok_or(RegistryError::WorkerNotFound(*id))?;
        let mut worker = entry.write().await;
        let old = worker.status;
        worker.status = status;

        info!(
            worker = %id.short(),
            old_status = ?old,
            new_status = ?status,
            "Worker status changed"
        );
        Ok(())
    }

    async fn entry(&self, id: &WorkerId) -> Option<Arc<RwLock<Worker>>> {
        self.workers.read().await.get(id).cloned()
    }
}
