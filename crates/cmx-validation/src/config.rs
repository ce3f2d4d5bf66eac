use crate::error::{Result, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Samples drawn per challenge, before capping at the output size
    pub sample_size: usize,
    /// Fraction of samples that must verify for a pass
    pub min_confidence: f64,
    pub stratified_sampling: bool,
    /// Flag near-miss failures for re-sampling
    pub adaptive_escalation: bool,
    /// Blocks to wait before a challenge may be answered, if any
    pub challenge_delay_blocks: Option<u64>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            sample_size: 1000,
            min_confidence: 0.999,
            stratified_sampling: true,
            adaptive_escalation: true,
            challenge_delay_blocks: None,
        }
    }
}

impl ValidationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(ValidationError::InvalidConfiguration(
                "sample_size must be at least 1".into(),
            ));
        }
        if !(self.min_confidence > 0.0 && self.min_confidence <= 1.0) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "min_confidence must be in (0, 1], got {}",
                self.min_confidence
            )));
        }
        Ok(())
    }
}
