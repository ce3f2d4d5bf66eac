//! Auto-selection router (ASR) for assigning jobs to workers.

pub mod collusion;
pub mod config;
pub mod error;
pub mod scoring;
pub mod selector;

pub use collusion::{CollusionPolicy, NeutralCollusionPolicy};
pub use config::SelectionConfig;
pub use error::{Result, SelectionError};
pub use scoring::WorkerScore;
pub use selector::WorkerSelector;
