use crate::error::{Result, TypesError};
use crate::id::{Hash, JobId, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,    // Submitted, price quoted
    Assigned,   // Worker selected
    Executing,  // Worker running off-engine
    Committed,  // Output root committed
    Validating, // Challenge issued, awaiting proof
    Completed,  // Proof accepted
    Failed,     // Proof rejected or job abandoned
    Slashed,    // Fraud proven against the worker
}

impl JobStatus {
    /// Position along the happy path; terminal failure states have none
    fn rank(&self) -> Option<u8> {
        use JobStatus::*;
        match self {
            Pending => Some(0),
            Assigned => Some(1),
            Executing => Some(2),
            Committed => Some(3),
            Validating => Some(4),
            Completed => Some(5),
            Failed | Slashed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Slashed)
    }

    /// Transitions move forward one step along the happy path, or jump to
    /// `Failed`/`Slashed` from any non-terminal state.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to == from + 1,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

/// Pricing tier of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobClass {
    #[default]
    Standard,
    Premium,
    Enterprise,
}

impl JobClass {
    pub fn price_multiplier(&self) -> f64 {
        match self {
            JobClass::Standard => 1.0,
            JobClass::Premium => 1.5,
            JobClass::Enterprise => 2.0,
        }
    }

    /// Lenient parse: unrecognized names price as `Standard`
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobClass::Standard => "standard",
            JobClass::Premium => "premium",
            JobClass::Enterprise => "enterprise",
        }
    }
}

impl FromStr for JobClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(JobClass::Standard),
            "premium" => Ok(JobClass::Premium),
            "enterprise" => Ok(JobClass::Enterprise),
            other => Err(format!("unknown job class: {}", other)),
        }
    }
}

impl fmt::Display for JobClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuRequirement {
    pub model: String,
    pub min_vram_gb: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSpecs {
    pub gpus: Vec<GpuRequirement>,
    pub region: Option<String>,
    pub framework: Option<String>,
    pub tags: Vec<String>,
}

/// Service-level terms agreed at submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sla {
    pub max_latency: Duration,
    pub max_retries: u32,
    pub timeout: Duration,
    pub required_uptime: f64,
}

impl Default for Sla {
    fn default() -> Self {
        Self {
            max_latency: Duration::from_secs(60),
            max_retries: 3,
            timeout: Duration::from_secs(3600),
            required_uptime: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub specs: JobSpecs,
    pub sla: Sla,
    pub class: JobClass,
    /// Relative cost of the job; 1.0 is baseline
    pub complexity: f64,
    pub price: Option<f64>,
    pub status: JobStatus,
    pub worker: Option<WorkerId>,
    pub output_root: Option<Hash>,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: impl Into<JobId>, specs: JobSpecs) -> Self {
        Self {
            id: id.into(),
            specs,
            sla: Sla::default(),
            class: JobClass::Standard,
            complexity: 1.0,
            price: None,
            status: JobStatus::Pending,
            worker: None,
            output_root: None,
            submitted_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_class(mut self, class: JobClass, complexity: f64) -> Self {
        self.class = class;
        self.complexity = complexity;
        self
    }

    /// Move to `next`, stamping completion time on terminal states
    pub fn transition_to(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(&next) {
            return Err(TypesError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}
