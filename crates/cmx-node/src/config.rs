use anyhow::{bail, Context, Result};
use cmx_pricing::PricingConfig;
use cmx_selection::SelectionConfig;
use cmx_validation::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Upper bound for node timers (30 days)
pub const MAX_TIMER_SECS: u64 = 30 * 24 * 3600;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSettings,
    pub selection: SelectionConfig,
    pub validation: ValidationConfig,
    pub pricing: PricingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub name: String,
    /// Genesis value for the local seed hash chain
    pub seed_genesis: String,
    /// Seconds between epoch quota resets
    pub epoch_length_secs: u64,
    /// Seconds between stats reports while running
    pub stats_interval_secs: u64,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: "cmx-node".to_string(),
            seed_genesis: "cmx-genesis".to_string(),
            epoch_length_secs: 3600,
            stats_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// One of `pretty`, `compact` or `json`
    pub format: String,
    pub file_output: Option<PathBuf>,
    /// Per-module level overrides, e.g. `cmx_pricing = "debug"`
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: HashMap::new(),
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `CMX_*` environment variable overrides. Unparseable values are
    /// ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(name) = env::var("CMX_NODE_NAME") {
            if !name.is_empty() {
                self.node.name = name;
            }
        }
        if let Ok(genesis) = env::var("CMX_SEED_GENESIS") {
            self.node.seed_genesis = genesis;
        }
        override_from_env("CMX_EPOCH_LENGTH_SECS", &mut self.node.epoch_length_secs);

        // Logging
        if let Ok(level) = env::var("CMX_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("CMX_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(path) = env::var("CMX_LOG_FILE") {
            self.logging.file_output = Some(PathBuf::from(path));
        }

        // Selection
        override_from_env("CMX_TOP_K", &mut self.selection.top_k);
        override_from_env("CMX_MAX_QUOTA", &mut self.selection.max_quota);
        override_from_env("CMX_EXPLORATION_RATE", &mut self.selection.exploration_rate);
        override_from_env("CMX_NEWCOMER_BOOST", &mut self.selection.newcomer_boost);

        // Validation
        override_from_env("CMX_SAMPLE_SIZE", &mut self.validation.sample_size);
        override_from_env("CMX_MIN_CONFIDENCE", &mut self.validation.min_confidence);

        // Pricing
        override_from_env("CMX_TARGET_UTILIZATION", &mut self.pricing.target_utilization);
        override_from_env("CMX_MIN_PRICE", &mut self.pricing.min_price);
        override_from_env("CMX_MAX_PRICE", &mut self.pricing.max_price);
        override_from_env(
            "CMX_ADJUSTMENT_INTERVAL_SECS",
            &mut self.pricing.adjustment_interval_secs,
        );
    }

    pub fn validate(&self) -> Result<()> {
        if self.node.name.is_empty() {
            bail!("node.name must not be empty");
        }
        if !(1..=MAX_TIMER_SECS).contains(&self.node.epoch_length_secs) {
            bail!(
                "node.epoch_length_secs must be in [1, {}], got {}",
                MAX_TIMER_SECS,
                self.node.epoch_length_secs
            );
        }
        if !(1..=MAX_TIMER_SECS).contains(&self.node.stats_interval_secs) {
            bail!(
                "node.stats_interval_secs must be in [1, {}], got {}",
                MAX_TIMER_SECS,
                self.node.stats_interval_secs
            );
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            bail!(
                "logging.format must be pretty, compact or json, got {}",
                self.logging.format
            );
        }

        self.selection
            .validate()
            .context("Invalid [selection] section")?;
        self.validation
            .validate()
            .context("Invalid [validation] section")?;
        self.pricing.validate().context("Invalid [pricing] section")?;
        Ok(())
    }
}

fn override_from_env<T: FromStr>(key: &str, target: &mut T) {
    if let Some(value) = env::var(key).ok().and_then(|v| v.parse().ok()) {
        *target = value;
    }
}
