//! Worker Registry: the single mutable owner of worker records.
//!
//! Engines receive an `Arc<WorkerRegistry>` handle; there is no ambient
//! registry state.

pub mod error;
pub mod registry;

pub use error::{RegistryError, Result};
pub use registry::{RegistryConfig, WorkerRegistry};
