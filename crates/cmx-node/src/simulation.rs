//! Synthetic workload for exercising the full pipeline locally.

use crate::error::{MarketplaceError, Result};
use crate::marketplace::Marketplace;
use cmx_selection::SelectionError;
use cmx_types::{
    GpuRequirement, GpuSpec, Job, JobClass, JobSpecs, JobStatus, Worker, WorkerId, WorkerSpecs,
};
use cmx_validation::{MerkleTree, Proof};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

const REGIONS: [&str; 3] = ["us-west", "eu-central", "ap-south"];
const GPUS: [(&str, u32); 3] = [("A100", 80), ("H100", 80), ("RTX4090", 24)];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParams {
    pub workers: usize,
    pub jobs: usize,
    /// Share of workers that serve corrupted samples
    pub dishonest_fraction: f64,
    /// Share of chunks a dishonest worker corrupts
    pub fraud_rate: f64,
    pub output_chunks: usize,
    pub jobs_per_epoch: usize,
    pub queue_time_secs: f64,
    /// Seed for the synthetic workload, not for protocol draws
    pub rng_seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            workers: 20,
            jobs: 100,
            dishonest_fraction: 0.1,
            fraud_rate: 0.05,
            output_chunks: 256,
            jobs_per_epoch: 16,
            queue_time_secs: 60.0,
            rng_seed: 7,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub submitted: usize,
    pub assigned: usize,
    pub no_eligible: usize,
    pub completed: usize,
    pub failed: usize,
    pub slashed: usize,
    pub revenue: f64,
    pub final_price: f64,
}

fn synthetic_worker(index: usize, rng: &mut StdRng) -> Worker {
    let mut id = [0u8; 32];
    rng.fill(&mut id);
    id[..8].copy_from_slice(&(index as u64).to_be_bytes());

    let (model, vram_gb) = GPUS[rng.gen_range(0..GPUS.len())];
    let specs = WorkerSpecs {
        gpus: vec![GpuSpec {
            model: model.to_string(),
            vram_gb,
            count: rng.gen_range(1..=8),
        }],
        cpu_cores: 32,
        ram_gb: 256,
        storage_gb: 2048,
        bandwidth_mbps: 10_000,
        region: REGIONS[rng.gen_range(0..REGIONS.len())].to_string(),
        asn: format!("AS{}", 64_500 + rng.gen_range(0..20)),
        organization: format!("org-{}", rng.gen_range(0..10)),
    };

    let mut worker = Worker::new(WorkerId::from_bytes(id), specs);
    // Half the fleet arrives with history
    if rng.gen_bool(0.5) {
        worker.is_newcomer = false;
        worker.performance.total_jobs = rng.gen_range(20..200);
        worker.performance.successful_jobs = worker.performance.total_jobs;
        worker.performance.pass_rate = rng.gen_range(0.9..=1.0);
        worker.performance.da_reliability = rng.gen_range(0.9..=1.0);
        worker.performance.uptime = rng.gen_range(0.9..=1.0);
    }
    worker
}

fn synthetic_job(index: usize, rng: &mut StdRng) -> Job {
    let class = match rng.gen_range(0..10) {
        0..=5 => JobClass::Standard,
        6..=8 => JobClass::Premium,
        _ => JobClass::Enterprise,
    };
    let mut specs = JobSpecs::default();
    if rng.gen_bool(0.5) {
        let (model, _) = GPUS[rng.gen_range(0..GPUS.len())];
        specs.gpus.push(GpuRequirement {
            model: model.to_string(),
            min_vram_gb: 16,
        });
    }
    Job::new(format!("job-{:05}", index), specs).with_class(class, rng.gen_range(0.5..3.0))
}

/// Register synthetic workers and push synthetic jobs through every stage
pub async fn run_simulation(market: &Marketplace, params: &SimulationParams) -> Result<SimulationReport> {
    let mut rng = StdRng::seed_from_u64(params.rng_seed);
    let mut dishonest = HashSet::new();

    for i in 0..params.workers {
        let worker = synthetic_worker(i, &mut rng);
        if rng.gen_bool(params.dishonest_fraction.clamp(0.0, 1.0)) {
            dishonest.insert(worker.id);
        }
        market.register_worker(worker).await;
    }

    info!(
        workers = params.workers,
        dishonest = dishonest.len(),
        jobs = params.jobs,
        "🧪 Simulation started"
    );

    let mut report = SimulationReport::default();
    let epoch_len = params.jobs_per_epoch.max(1);

    for i in 0..params.jobs {
        if i > 0 && i % epoch_len == 0 {
            market.start_epoch().await;
            market.prune_settled().await;
            market.refresh_pricing_metrics(params.queue_time_secs).await;
            market.pricing().run_adjustment_cycle().await;
        }

        let job = synthetic_job(i, &mut rng);
        let job_id = job.id.clone();
        let price = market.submit_job(job).await?;
        report.submitted += 1;

        let worker = match market.assign_job(&job_id).await {
            Ok(worker) => worker,
            Err(MarketplaceError::Selection(SelectionError::NoEligibleWorkers)) => {
                report.no_eligible += 1;
                market.fail_job(&job_id).await?;
                continue;
            }
            Err(e) => return Err(e),
        };
        report.assigned += 1;

        market.start_execution(&job_id).await?;
        let chunks: Vec<Vec<u8>> = (0..params.output_chunks.max(1))
            .map(|c| format!("{}:{}", job_id, c).into_bytes())
            .collect();
        let Some(tree) = MerkleTree::from_leaves(&chunks) else {
            continue;
        };
        market
            .commit_output(&job_id, tree.root(), chunks.len() as u64)
            .await?;

        let challenge = market.issue_challenge(&job_id).await?;
        let mut proof = Proof::answer(&challenge, &tree, &chunks);
        if dishonest.contains(&worker) {
            for data in proof.samples.values_mut() {
                if rng.gen_bool(params.fraud_rate.clamp(0.0, 1.0)) {
                    data.reverse();
                    data.push(0xFF);
                }
            }
        }

        let result = market.settle_job(&job_id, &proof).await?;
        match market.job(&job_id).await.map(|j| j.status) {
            Some(JobStatus::Completed) => {
                report.completed += 1;
                report.revenue += price;
            }
            Some(JobStatus::Slashed) => report.slashed += 1,
            _ => report.failed += 1,
        }
        debug!(job_id = %job_id, passed = result.passed, "Simulated job settled");
    }

    report.final_price = market.pricing().current_price().await;

    info!(
        completed = report.completed,
        failed = report.failed,
        slashed = report.slashed,
        no_eligible = report.no_eligible,
        revenue = report.revenue,
        final_price = report.final_price,
        "🧪 Simulation finished"
    );

    Ok(report)
}
