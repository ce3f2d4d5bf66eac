use cmx_pricing::PricingError;
use cmx_registry::RegistryError;
use cmx_selection::SelectionError;
use cmx_types::{JobId, TypesError};
use cmx_validation::ValidationError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MarketplaceError>;

#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job already submitted: {0}")]
    DuplicateJob(JobId),

    #[error("Job {job_id} is missing {what}")]
    MissingJobData { job_id: JobId, what: &'static str },

    #[error(transparent)]
    Types(#[from] TypesError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}
