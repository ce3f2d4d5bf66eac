//! Posted price controller (PPC) for compute jobs.

pub mod config;
pub mod controller;
pub mod error;

pub use config::{PricingConfig, MAX_ADJUSTMENT_INTERVAL_SECS};
pub use controller::{price_job, PriceController, PricingStats};
pub use error::{PricingError, Result};
