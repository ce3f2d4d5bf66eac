use cmx_registry::RegistryError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SelectionError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("no eligible workers found")]
    NoEligibleWorkers,

    #[error("Invalid selection configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
