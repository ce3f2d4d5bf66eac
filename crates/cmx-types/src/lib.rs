//! Shared data model for the compute marketplace decision core: workers,
//! jobs, identities and the opaque randomness seeds every engine consumes.

pub mod error;
pub mod id;
pub mod job;
pub mod worker;

pub use error::{Result, TypesError};
pub use id::{Hash, JobId, Seed, WorkerId};
pub use job::{GpuRequirement, Job, JobClass, JobSpecs, JobStatus, Sla};
pub use worker::{GpuSpec, PerformanceStats, Worker, WorkerSpecs, WorkerStatus};
