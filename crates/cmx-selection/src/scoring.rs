//! Score components for ranking eligible workers.
//!
//! Every component is a pure function of the worker, the job and the
//! selection config, so ranking a snapshot is reproducible.

use crate::config::SelectionConfig;
use chrono::{DateTime, Duration, Utc};
use cmx_types::{Job, Worker, WorkerId};
use serde::{Deserialize, Serialize};

const GPU_MATCH_BONUS: f64 = 1.2;
const REGION_MATCH_BONUS: f64 = 1.1;
const MAX_SUITABILITY: f64 = 2.0;

/// Score assigned to workers with no job history
const NEUTRAL_PERFORMANCE: f64 = 0.5;

const PASS_RATE_WEIGHT: f64 = 0.4;
const DA_WEIGHT: f64 = 0.3;
const UPTIME_WEIGHT: f64 = 0.3;

/// Quota usage ratio past which fairness decays linearly to zero
const QUOTA_PENALTY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerScore {
    pub worker: WorkerId,
    pub suitability: f64,
    pub performance: f64,
    pub fairness: f64,
    pub total: f64,
    pub is_newcomer: bool,
}

/// Hard requirements: active, under quota, required GPUs present with enough
/// VRAM, and same region when the job names one.
pub fn is_eligible(worker: &Worker, job: &Job, config: &SelectionConfig) -> bool {
    if !worker.is_active() {
        return false;
    }
    if worker.quota_used >= config.max_quota {
        return false;
    }
    let hardware_ok = job
        .specs
        .gpus
        .iter()
        .all(|req| worker.specs.has_gpu_with_vram(&req.model, req.min_vram_gb));
    if !hardware_ok {
        return false;
    }
    match &job.specs.region {
        Some(region) => worker.specs.region == *region,
        None => true,
    }
}

pub fn suitability(worker: &Worker, job: &Job) -> f64 {
    let mut score = 1.0;

    if job
        .specs
        .gpus
        .iter()
        .any(|req| worker.specs.has_gpu_model(&req.model))
    {
        score *= GPU_MATCH_BONUS;
    }

    if let Some(region) = &job.specs.region {
        if worker.specs.region == *region {
            score *= REGION_MATCH_BONUS;
        }
    }

    f64::min(score, MAX_SUITABILITY)
}

/// Weighted pass rate, DA reliability and uptime. Workers with no history,
/// or whose last update is older than the performance window as of `now`,
/// score neutral.
pub fn performance(worker: &Worker, config: &SelectionConfig, now: DateTime<Utc>) -> f64 {
    let perf = &worker.performance;
    if !perf.has_history() {
        return NEUTRAL_PERFORMANCE;
    }
    let window = Duration::days(i64::from(config.performance_window_days));
    if perf.last_updated.is_some_and(|at| now - at > window) {
        return NEUTRAL_PERFORMANCE;
    }
    PASS_RATE_WEIGHT * perf.pass_rate + DA_WEIGHT * perf.da_reliability + UPTIME_WEIGHT * perf.uptime
}

/// Quota pressure and newcomer boost. Collusion adjustments are applied by
/// the selector on top of this.
pub fn fairness(worker: &Worker, config: &SelectionConfig) -> f64 {
    let mut score = 1.0;

    let usage_ratio = worker.quota_used / config.max_quota;
    if usage_ratio > QUOTA_PENALTY_THRESHOLD {
        score *= 1.0 - usage_ratio;
    }

    if worker.is_newcomer {
        score *= 1.0 + config.newcomer_boost;
    }

    score
}
