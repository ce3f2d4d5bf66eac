pub mod config;
pub mod error;
pub mod logging;
pub mod marketplace;
pub mod metrics;
pub mod seeds;
pub mod simulation;

pub use config::{LoggingConfig, NodeConfig};
pub use error::{MarketplaceError, Result};
pub use marketplace::{JobRecord, Marketplace};
pub use metrics::Metrics;
pub use seeds::{HashChainSeeds, SeedSource};
