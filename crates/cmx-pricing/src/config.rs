use crate::error::{PricingError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted adjustment interval (one week)
pub const MAX_ADJUSTMENT_INTERVAL_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Utilization the controller steers toward, in (0, 1]
    pub target_utilization: f64,
    pub target_queue_time_secs: f64,
    /// Gain on utilization error
    pub alpha: f64,
    /// Gain on normalized queue-time error
    pub beta: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub adjustment_interval_secs: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            target_utilization: 0.7,
            target_queue_time_secs: 60.0,
            alpha: 0.1,
            beta: 0.05,
            min_price: 0.001,
            max_price: 10.0,
            adjustment_interval_secs: 300,
        }
    }
}

impl PricingConfig {
    pub fn adjustment_interval(&self) -> Duration {
        Duration::from_secs(self.adjustment_interval_secs)
    }

    /// Starting price: midpoint of the bounds
    pub fn initial_price(&self) -> f64 {
        (self.min_price + self.max_price) / 2.0
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PricingError::InvalidConfiguration(msg));

        if !(self.min_price.is_finite() && self.min_price > 0.0) {
            return invalid(format!("min_price must be positive, got {}", self.min_price));
        }
        if !(self.max_price.is_finite() && self.max_price >= self.min_price) {
            return invalid(format!(
                "max_price must be at least min_price ({}), got {}",
                self.min_price, self.max_price
            ));
        }
        if !(self.target_queue_time_secs.is_finite() && self.target_queue_time_secs > 0.0) {
            return invalid(format!(
                "target_queue_time_secs must be positive, got {}",
                self.target_queue_time_secs
            ));
        }
        if !(self.target_utilization > 0.0 && self.target_utilization <= 1.0) {
            return invalid(format!(
                "target_utilization must be in (0, 1], got {}",
                self.target_utilization
            ));
        }
        if !self.alpha.is_finite() || !self.beta.is_finite() {
            return invalid(format!(
                "controller gains must be finite, got alpha={} beta={}",
                self.alpha, self.beta
            ));
        }
        if !(1..=MAX_ADJUSTMENT_INTERVAL_SECS).contains(&self.adjustment_interval_secs) {
            return invalid(format!(
                "adjustment_interval_secs must be in [1, {}], got {}",
                MAX_ADJUSTMENT_INTERVAL_SECS, self.adjustment_interval_secs
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PricingConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.initial_price() - 5.0005).abs() < 1e-12);
        assert_eq!(config.adjustment_interval(), Duration::from_secs(300));

        let longest = PricingConfig {
            adjustment_interval_secs: MAX_ADJUSTMENT_INTERVAL_SECS,
            ..Default::default()
        };
        assert!(longest.validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let cases = [
            PricingConfig { min_price: 0.0, ..Default::default() },
            PricingConfig { max_price: 0.0005, ..Default::default() },
            PricingConfig { max_price: f64::INFINITY, ..Default::default() },
            PricingConfig { target_queue_time_secs: 0.0, ..Default::default() },
            PricingConfig { target_utilization: 1.2, ..Default::default() },
            PricingConfig { alpha: f64::NAN, ..Default::default() },
            PricingConfig { adjustment_interval_secs: 0, ..Default::default() },
            PricingConfig { adjustment_interval_secs: u64::MAX, ..Default::default() },
            PricingConfig {
                adjustment_interval_secs: MAX_ADJUSTMENT_INTERVAL_SECS + 1,
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "{:?} should be rejected", config);
        }
    }
}
