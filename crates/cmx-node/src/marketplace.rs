use crate::config::NodeConfig;
use crate::error::{MarketplaceError, Result};
use crate::metrics::Metrics;
use crate::seeds::SeedSource;
use chrono::{DateTime, Utc};
use cmx_pricing::PriceController;
use cmx_registry::{RegistryError, WorkerRegistry};
use cmx_selection::{SelectionError, WorkerSelector};
use cmx_types::{Hash, Job, JobId, JobStatus, Seed, TypesError, Worker, WorkerId, WorkerStatus};
use cmx_validation::{Challenge, Proof, ProofValidator, ValidationResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Everything the pipeline knows about one job
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job: Job,
    pub output_size: Option<u64>,
    pub challenge: Option<Challenge>,
    pub result: Option<ValidationResult>,
    pub assigned_at: Option<DateTime<Utc>>,
}

/// Job lifecycle driver wiring the registry, selector, validator and price
/// controller together.
///
/// `submit → assign → execute → commit → challenge → settle`. Each job sits
/// behind its own lock, so pipelines for different jobs run concurrently.
pub struct Marketplace {
    registry: Arc<WorkerRegistry>,
    selector: WorkerSelector,
    validator: ProofValidator,
    pricing: Arc<PriceController>,
    seeds: Mutex<Box<dyn SeedSource>>,
    jobs: RwLock<HashMap<JobId, Arc<Mutex<JobRecord>>>>,
    /// Jobs between assignment and a terminal state
    in_flight: AtomicUsize,
    metrics: Option<Metrics>,
}

impl Marketplace {
    pub fn new(
        config: &NodeConfig,
        registry: Arc<WorkerRegistry>,
        seeds: Box<dyn SeedSource>,
    ) -> Result<Self> {
        let selector = WorkerSelector::new(registry.clone(), config.selection.clone())?;
        let validator = ProofValidator::new(config.validation.clone())?;
        let pricing = Arc::new(PriceController::new(config.pricing.clone())?);

        Ok(Self {
            registry,
            selector,
            validator,
            pricing,
            seeds: Mutex::new(seeds),
            jobs: RwLock::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn selector(&self) -> &WorkerSelector {
        &self.selector
    }

    pub fn validator(&self) -> &ProofValidator {
        &self.validator
    }

    pub fn pricing(&self) -> &Arc<PriceController> {
        &self.pricing
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    pub async fn register_worker(&self, worker: Worker) {
        self.registry.register(worker).await;
        if let Some(m) = &self.metrics {
            m.registered_workers.set(self.registry.len().await as i64);
        }
    }

    /// Epoch boundary: every worker's quota starts over
    pub async fn start_epoch(&self) {
        self.registry.reset_epoch_quotas().await;
        if let Some(m) = &self.metrics {
            m.epochs_total.inc();
        }
    }

    /// Quote and queue a pending job; returns the quoted price
    pub async fn submit_job(&self, mut job: Job) -> Result<f64> {
        if job.status != JobStatus::Pending {
            return Err(TypesError::InvalidTransition {
                from: job.status,
                to: JobStatus::Pending,
            }
            .into());
        }

        let price = self.pricing.quote(job.class, job.complexity).await;
        job.price = Some(price);

        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(MarketplaceError::DuplicateJob(job.id));
        }

        info!(
            job_id = %job.id,
            class = %job.class,
            complexity = job.complexity,
            price,
            "📥 Job submitted"
        );

        let id = job.id.clone();
        let record = JobRecord {
            job,
            output_size: None,
            challenge: None,
            result: None,
            assigned_at: None,
        };
        jobs.insert(id, Arc::new(Mutex::new(record)));
        Ok(price)
    }

    /// Select a worker for a pending job
    pub async fn assign_job(&self, job_id: &str) -> Result<WorkerId> {
        let entry = self.entry(job_id).await?;
        let mut record = entry.lock().await;
        ensure_transition(&record.job, JobStatus::Assigned)?;

        let seed = self.next_seed().await;
        let worker = match self.selector.select_worker(&record.job, &seed).await {
            Ok(worker) => worker,
            Err(e) => {
                if let (Some(m), SelectionError::NoEligibleWorkers) = (&self.metrics, &e) {
                    m.selection_failures.inc();
                }
                return Err(e.into());
            }
        };

        record.job.transition_to(JobStatus::Assigned)?;
        record.job.worker = Some(worker);
        record.assigned_at = Some(Utc::now());
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if let Some(m) = &self.metrics {
            m.selections_total.inc();
        }

        Ok(worker)
    }

    pub async fn start_execution(&self, job_id: &str) -> Result<()> {
        let entry = self.entry(job_id).await?;
        let mut record = entry.lock().await;
        record.job.transition_to(JobStatus::Executing)?;
        Ok(())
    }

    /// Record the worker's committed output root and chunk count
    pub async fn commit_output(&self, job_id: &str, output_root: Hash, output_size: u64) -> Result<()> {
        let entry = self.entry(job_id).await?;
        let mut record = entry.lock().await;
        record.job.transition_to(JobStatus::Committed)?;
        record.job.output_root = Some(output_root);
        record.output_size = Some(output_size);

        info!(
            job_id,
            output_root = %hex::encode(&output_root[..8]),
            output_size,
            "📦 Output committed"
        );
        Ok(())
    }

    /// Draw a sampling challenge against the committed output
    pub async fn issue_challenge(&self, job_id: &str) -> Result<Challenge> {
        let entry = self.entry(job_id).await?;
        let mut record = entry.lock().await;
        ensure_transition(&record.job, JobStatus::Validating)?;
        let output_size = record.output_size.ok_or_else(|| missing(job_id, "output size"))?;

        let seed = self.next_seed().await;
        let challenge = self.validator.generate_challenge(job_id, output_size, &seed);
        record.job.transition_to(JobStatus::Validating)?;
        record.challenge = Some(challenge.clone());

        Ok(challenge)
    }

    /// Verify the worker's proof and close the job.
    ///
    /// The proof is always checked against the root committed earlier. Any
    /// sample that fails authentication slashes the job and the worker; a
    /// proof that is merely incomplete fails the job.
    pub async fn settle_job(&self, job_id: &str, proof: &Proof) -> Result<ValidationResult> {
        let entry = self.entry(job_id).await?;
        let mut record = entry.lock().await;
        ensure_transition(&record.job, JobStatus::Completed)?;

        let challenge = record
            .challenge
            .clone()
            .ok_or_else(|| missing(job_id, "challenge"))?;
        let committed_root = record
            .job
            .output_root
            .ok_or_else(|| missing(job_id, "output root"))?;
        let worker = record.job.worker.ok_or_else(|| missing(job_id, "worker"))?;

        let result = if proof.output_root == committed_root {
            self.validator.verify_proof(&challenge, proof)
        } else {
            warn!(job_id, worker = %worker.short(), "Proof claims a root other than the committed one");
            let mut pinned = proof.clone();
            pinned.output_root = committed_root;
            self.validator.verify_proof(&challenge, &pinned)
        };

        let latency = record
            .assigned_at
            .map(|at| (Utc::now() - at).num_milliseconds().max(0) as f64 / 1000.0);
        tolerate_departed(
            self.registry
                .record_validation(&worker, result.passed, latency)
                .await,
        )?;

        let next = if result.has_invalid_proof() {
            tolerate_departed(self.registry.set_status(&worker, WorkerStatus::Slashed).await)?;
            JobStatus::Slashed
        } else if result.passed {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        record.job.transition_to(next)?;
        record.result = Some(result.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(m) = &self.metrics {
            if result.passed {
                m.validations_passed.inc();
            } else {
                m.validations_failed.inc();
            }
            m.samples_verified.inc_by(result.samples_verified as u64);
            if next == JobStatus::Slashed {
                m.jobs_slashed.inc();
            }
        }

        info!(
            job_id,
            worker = %worker.short(),
            status = ?next,
            confidence = result.confidence,
            "🏁 Job settled"
        );

        Ok(result)
    }

    /// Abandon a job that has not reached a terminal state
    pub async fn fail_job(&self, job_id: &str) -> Result<()> {
        let entry = self.entry(job_id).await?;
        let mut record = entry.lock().await;
        let was_in_flight = is_in_flight(record.job.status);
        record.job.transition_to(JobStatus::Failed)?;
        if was_in_flight {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        warn!(job_id, "Job abandoned");
        Ok(())
    }

    pub async fn job(&self, job_id: &str) -> Option<Job> {
        self.record(job_id).await.map(|r| r.job)
    }

    pub async fn record(&self, job_id: &str) -> Option<JobRecord> {
        let entry = self.entry(job_id).await.ok()?;
        let record = entry.lock().await.clone();
        Some(record)
    }

    /// Jobs assigned but not yet settled
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Drop records of jobs in a terminal state; returns how many were
    /// removed
    pub async fn prune_settled(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let mut settled = Vec::new();
        for (id, entry) in jobs.iter() {
            if entry.lock().await.job.status.is_terminal() {
                settled.push(id.clone());
            }
        }
        for id in &settled {
            jobs.remove(id);
        }
        if !settled.is_empty() {
            debug!(pruned = settled.len(), remaining = jobs.len(), "Settled jobs pruned");
        }
        settled.len()
    }

    /// Feed the price controller utilization (in-flight jobs per active
    /// worker) and the caller-observed queue time.
    pub async fn refresh_pricing_metrics(&self, queue_time_secs: f64) {
        let active = self
            .registry
            .snapshot()
            .await
            .iter()
            .filter(|w| w.is_active())
            .count();
        let utilization = if active == 0 {
            0.0
        } else {
            self.in_flight() as f64 / active as f64
        };

        self.pricing.update_metrics(utilization, queue_time_secs).await;
        if let Some(m) = &self.metrics {
            m.current_price.set(self.pricing.current_price().await);
        }
    }

    async fn next_seed(&self) -> Seed {
        self.seeds.lock().await.next_seed()
    }

    async fn entry(&self, job_id: &str) -> Result<Arc<Mutex<JobRecord>>> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| MarketplaceError::JobNotFound(job_id.to_string()))
    }
}

fn ensure_transition(job: &Job, next: JobStatus) -> Result<()> {
    if job.status.can_transition_to(&next) {
        Ok(())
    } else {
        Err(TypesError::InvalidTransition {
            from: job.status,
            to: next,
        }
        .into())
    }
}

fn is_in_flight(status: JobStatus) -> bool {
    matches!(
        status,
        JobStatus::Assigned | JobStatus::Executing | JobStatus::Committed | JobStatus::Validating
    )
}

fn missing(job_id: &str, what: &'static str) -> MarketplaceError {
    MarketplaceError::MissingJobData {
        job_id: job_id.to_string(),
        what,
    }
}

/// A worker deregistered mid-job has no record left to update
fn tolerate_departed(result: cmx_registry::Result<()>) -> Result<()> {
    match result {
        Err(RegistryError::WorkerNotFound(id)) => {
            warn!(worker = %id.short(), "Worker left the registry before settlement");
            Ok(())
        }
        other => Ok(other?),
    }
}
