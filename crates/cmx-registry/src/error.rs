use cmx_types::WorkerId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Worker not found: {0}")]
    WorkerNotFound(WorkerId),

    #[error("Invalid quota increment: {0}")]
    InvalidQuotaIncrement(f64),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
