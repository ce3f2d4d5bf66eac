use thiserror::Error;

pub type Result<T> = std::result::Result<T, PricingError>;

/// Only construction can fail; a running controller clamps every input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    #[error("Invalid pricing configuration: {0}")]
    InvalidConfiguration(String),
}
