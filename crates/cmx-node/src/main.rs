use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cmx_node::simulation::{run_simulation, SimulationParams};
use cmx_node::{logging, HashChainSeeds, Marketplace, Metrics, NodeConfig};
use cmx_registry::WorkerRegistry;
use cmx_validation::{estimate_fraud_detection_probability, required_sample_size};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "./cmx-config.toml";

#[derive(Parser)]
#[command(name = "cmx")]
#[command(about = "Compute marketplace decision core", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the price controller until interrupted
    Start,

    /// Write a default configuration file
    Init {
        /// Where to write the configuration
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Push a synthetic workload through the full pipeline
    Simulate {
        #[arg(long, default_value = "20")]
        workers: usize,

        #[arg(long, default_value = "100")]
        jobs: usize,

        /// Share of workers serving corrupted samples
        #[arg(long, default_value = "0.1")]
        dishonest: f64,

        /// Share of chunks a dishonest worker corrupts
        #[arg(long, default_value = "0.05")]
        fraud_rate: f64,

        /// Chunks per job output
        #[arg(long, default_value = "256")]
        chunks: usize,

        /// Workload seed
        #[arg(long, default_value = "7")]
        seed: u64,

        /// Print Prometheus metrics afterwards
        #[arg(long)]
        metrics: bool,
    },

    /// Fraud detection probability for a sample size, or the sample size
    /// needed to reach a target probability
    Estimate {
        /// Fraction of corrupted output
        #[arg(long)]
        fraud_rate: f64,

        #[arg(long, conflicts_with = "target")]
        samples: Option<u64>,

        /// Desired detection probability
        #[arg(long)]
        target: Option<f64>,
    },
}

fn load_config(path: Option<&Path>) -> Result<NodeConfig> {
    let mut config = match path {
        Some(path) => NodeConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            NodeConfig::from_file(Path::new(DEFAULT_CONFIG_PATH))?
        }
        None => NodeConfig::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    if let Err(e) = logging::init_logging(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli.command {
        Commands::Start => run_start(config).await,

        Commands::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    output.display()
                );
            }
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            NodeConfig::default()
                .save_to_file(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(path = %output.display(), "⚙️ Default configuration written");
            Ok(())
        }

        Commands::Simulate {
            workers,
            jobs,
            dishonest,
            fraud_rate,
            chunks,
            seed,
            metrics,
        } => {
            let registry = Arc::new(WorkerRegistry::default());
            let seeds = Box::new(HashChainSeeds::new(&config.node.seed_genesis));
            let collector = Metrics::new()?;
            let market =
                Marketplace::new(&config, registry, seeds)?.with_metrics(collector.clone());

            let params = SimulationParams {
                workers,
                jobs,
                dishonest_fraction: dishonest,
                fraud_rate,
                output_chunks: chunks,
                rng_seed: seed,
                ..Default::default()
            };
            let report = run_simulation(&market, &params).await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
            if metrics {
                println!("{}", collector.gather());
            }
            Ok(())
        }

        Commands::Estimate {
            fraud_rate,
            samples,
            target,
        } => {
            match (samples, target) {
                (_, Some(target)) => match required_sample_size(fraud_rate, target) {
                    Some(s) => println!(
                        "fraud rate {} needs {} samples for detection probability {}",
                        fraud_rate, s, target
                    ),
                    None => println!(
                        "no finite sample size reaches {} at fraud rate {}",
                        target, fraud_rate
                    ),
                },
                (samples, None) => {
                    let s = samples.unwrap_or(config.validation.sample_size as u64);
                    println!(
                        "P(detect) = {:.6} for fraud rate {} with {} samples",
                        estimate_fraud_detection_probability(fraud_rate, s),
                        fraud_rate,
                        s
                    );
                }
            }
            Ok(())
        }
    }
}

async fn run_start(config: NodeConfig) -> Result<()> {
    info!(
        name = %config.node.name,
        interval_secs = config.pricing.adjustment_interval_secs,
        epoch_length_secs = config.node.epoch_length_secs,
        "🚀 Starting marketplace node"
    );

    let registry = Arc::new(WorkerRegistry::default());
    let seeds = Box::new(HashChainSeeds::new(&config.node.seed_genesis));
    let market = Marketplace::new(&config, registry, seeds)?.with_metrics(Metrics::new()?);
    market.pricing().start().await;

    let mut stats_timer =
        tokio::time::interval(Duration::from_secs(config.node.stats_interval_secs));
    let epoch_length = Duration::from_secs(config.node.epoch_length_secs);
    let mut epoch_timer =
        tokio::time::interval_at(tokio::time::Instant::now() + epoch_length, epoch_length);

    loop {
        tokio::select! {
            _ = stats_timer.tick() => {
                let stats = market.pricing().stats().await;
                if let Some(m) = market.metrics() {
                    m.current_price.set(stats.current_price);
                }
                info!(
                    price = stats.current_price,
                    utilization = stats.utilization,
                    queue_time_secs = stats.queue_time_secs,
                    adjustments = stats.adjustments,
                    workers = market.registry().len().await,
                    "📊 Pricing stats"
                );
            }
            _ = epoch_timer.tick() => {
                market.start_epoch().await;
                market.prune_settled().await;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    info!("🛑 Shutting down gracefully");
    market.pricing().stop().await;
    Ok(())
}
