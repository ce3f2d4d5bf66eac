use crate::error::{Result, SelectionError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Candidates kept after ranking
    pub top_k: usize,
    /// Per-epoch quota ceiling; workers at or above it are ineligible
    pub max_quota: f64,
    /// Probability of picking a newcomer from the top-K instead of weighting
    pub exploration_rate: f64,
    /// Fractional score boost for newcomers
    pub newcomer_boost: f64,
    /// History last updated longer ago than this scores as neutral, in days
    pub performance_window_days: u32,
    pub anti_collusion_enabled: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            top_k: 64,
            max_quota: 0.125,
            exploration_rate: 0.05,
            newcomer_boost: 0.1,
            performance_window_days: 30,
            anti_collusion_enabled: true,
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(SelectionError::InvalidConfiguration(
                "top_k must be at least 1".into(),
            ));
        }
        if !(self.max_quota > 0.0 && self.max_quota <= 1.0) {
            return Err(SelectionError::InvalidConfiguration(format!(
                "max_quota must be in (0, 1], got {}",
                self.max_quota
            )));
        }
        if !(0.0..=1.0).contains(&self.exploration_rate) {
            return Err(SelectionError::InvalidConfiguration(format!(
                "exploration_rate must be in [0, 1], got {}",
                self.exploration_rate
            )));
        }
        if self.performance_window_days == 0 {
            return Err(SelectionError::InvalidConfiguration(
                "performance_window_days must be at least 1".into(),
            ));
        }
        if !self.newcomer_boost.is_finite() || self.newcomer_boost < 0.0 {
            return Err(SelectionError::InvalidConfiguration(format!(
                "newcomer_boost must be a non-negative number, got {}",
                self.newcomer_boost
            )));
        }
        Ok(())
    }
}
