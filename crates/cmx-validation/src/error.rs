use thiserror::Error;

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Construction-time failures. Problems with individual samples are
/// reported as [`crate::Defect`]s on the result, never as errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid validation configuration: {0}")]
    InvalidConfiguration(String),
}
