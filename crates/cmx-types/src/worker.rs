use crate::id::WorkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Active,
    Inactive,
    Suspended,
    Slashed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuSpec {
    pub model: String,
    pub vram_gb: u32,
    pub count: u32,
}

/// Hardware and network capabilities advertised by a worker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpecs {
    pub gpus: Vec<GpuSpec>,
    pub cpu_cores: u32,
    pub ram_gb: u32,
    pub storage_gb: u32,
    pub bandwidth_mbps: u32,
    pub region: String,
    pub asn: String,
    pub organization: String,
}

impl WorkerSpecs {
    pub fn has_gpu_model(&self, model: &str) -> bool {
        self.gpus.iter().any(|gpu| gpu.model == model)
    }

    /// True if some GPU of this model has at least `min_vram_gb`
    pub fn has_gpu_with_vram(&self, model: &str, min_vram_gb: u32) -> bool {
        self.gpus
            .iter()
            .any(|gpu| gpu.model == model && gpu.vram_gb >= min_vram_gb)
    }
}

/// Historical performance of a worker, fed by validation outcomes and
/// availability reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total_jobs: u64,
    pub successful_jobs: u64,
    pub failed_jobs: u64,
    /// Fraction of probabilistic checks passed
    pub pass_rate: f64,
    /// Data-availability reliability in [0, 1]
    pub da_reliability: f64,
    pub avg_latency_secs: f64,
    pub uptime: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for PerformanceStats {
    fn default() -> Self {
        Self {
            total_jobs: 0,
            successful_jobs: 0,
            failed_jobs: 0,
            pass_rate: 0.0,
            da_reliability: 0.0,
            avg_latency_secs: 0.0,
            uptime: 0.0,
            last_updated: None,
        }
    }
}

impl PerformanceStats {
    pub fn has_history(&self) -> bool {
        self.total_jobs > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub specs: WorkerSpecs,
    pub performance: PerformanceStats,
    pub status: WorkerStatus,
    /// Share of the current epoch's selection weight consumed, in [0, 1]
    pub quota_used: f64,
    pub is_newcomer: bool,
    pub registered_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Worker {
    /// A freshly registered, active newcomer with no history
    pub fn new(id: WorkerId, specs: WorkerSpecs) -> Self {
        let now = Utc::now();
        Self {
            id,
            specs,
            performance: PerformanceStats::default(),
            status: WorkerStatus::Active,
            quota_used: 0.0,
            is_newcomer: true,
            registered_at: now,
            last_active_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkerStatus::Active
    }
}
