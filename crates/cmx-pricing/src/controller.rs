use crate::config::PricingConfig;
use crate::error::Result;
use chrono::{DateTime, Utc};
use cmx_types::JobClass;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const MIN_COMPLEXITY: f64 = 0.5;
const MAX_COMPLEXITY: f64 = 3.0;

#[derive(Debug, Clone)]
struct PriceState {
    current_price: f64,
    utilization: f64,
    queue_time_secs: f64,
    adjustments: u64,
    last_adjusted_at: Option<DateTime<Utc>>,
}

/// Snapshot of controller state for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingStats {
    pub current_price: f64,
    pub utilization: f64,
    pub queue_time_secs: f64,
    pub target_utilization: f64,
    pub target_queue_time_secs: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub adjustments: u64,
    pub last_adjusted_at: Option<DateTime<Utc>>,
    pub running: bool,
}

struct LoopHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Posted price controller.
///
/// Each cycle moves the base price by `α·(u − u*) + β·(q − q*)/q*`,
/// relative to the current price, and clamps it to the configured bounds.
/// Cycles run on a background task between [`start`](Self::start) and
/// [`stop`](Self::stop); dropping the controller closes the shutdown
/// channel, which also ends the task.
pub struct PriceController {
    config: PricingConfig,
    state: Arc<RwLock<PriceState>>,
    handle: Mutex<Option<LoopHandle>>,
}

impl PriceController {
    pub fn new(config: PricingConfig) -> Result<Self> {
        config.validate()?;
        let state = PriceState {
            current_price: config.initial_price(),
            utilization: 0.0,
            queue_time_secs: 0.0,
            adjustments: 0,
            last_adjusted_at: None,
        };
        Ok(Self {
            config,
            state: Arc::new(RwLock::new(state)),
            handle: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Spawn the periodic adjustment task. No-op if already running.
    pub async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.task.is_finished()) {
            warn!("Price controller already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(adjustment_loop(
            self.config.clone(),
            self.state.clone(),
            shutdown_rx,
        ));
        *handle = Some(LoopHandle { shutdown_tx, task });

        info!(
            interval_secs = self.config.adjustment_interval_secs,
            "▶️ Price controller started"
        );
    }

    /// Halt the adjustment task and wait for it to exit. Safe to call
    /// repeatedly.
    pub async fn stop(&self) {
        let Some(LoopHandle { shutdown_tx, task }) = self.handle.lock().await.take() else {
            debug!("Price controller already stopped");
            return;
        };

        // A send error means the loop already exited
        let _ = shutdown_tx.send(true);
        if let Err(e) = task.await {
            warn!(error = %e, "Price adjustment task ended abnormally");
        }
        info!("⏹️ Price controller stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    /// Run one adjustment cycle now; returns the new price
    pub async fn run_adjustment_cycle(&self) -> f64 {
        adjust_price(&self.config, &self.state).await
    }

    /// Overwrite the telemetry the next cycle will act on.
    ///
    /// Utilization is clamped to `[0, 1]` and queue time to `>= 0`;
    /// non-finite readings are dropped.
    pub async fn update_metrics(&self, utilization: f64, queue_time_secs: f64) {
        let mut state = self.state.write().await;
        if utilization.is_finite() {
            state.utilization = utilization.clamp(0.0, 1.0);
        } else {
            warn!(utilization, "Ignoring non-finite utilization reading");
        }
        if queue_time_secs.is_finite() {
            state.queue_time_secs = queue_time_secs.max(0.0);
        } else {
            warn!(queue_time_secs, "Ignoring non-finite queue time reading");
        }
        debug!(
            utilization = state.utilization,
            queue_time_secs = state.queue_time_secs,
            "Pricing metrics updated"
        );
    }

    pub async fn current_price(&self) -> f64 {
        self.state.read().await.current_price
    }

    /// Quote by class name; unknown names price as standard
    pub async fn quote_job_price(&self, class_name: &str, complexity: f64) -> f64 {
        self.quote(JobClass::from_name(class_name), complexity).await
    }

    pub async fn quote(&self, class: JobClass, complexity: f64) -> f64 {
        price_job(self.current_price().await, class, complexity)
    }

    pub async fn stats(&self) -> PricingStats {
        let running = self.is_running().await;
        let state = self.state.read().await;
        PricingStats {
            current_price: state.current_price,
            utilization: state.utilization,
            queue_time_secs: state.queue_time_secs,
            target_utilization: self.config.target_utilization,
            target_queue_time_secs: self.config.target_queue_time_secs,
            min_price: self.config.min_price,
            max_price: self.config.max_price,
            adjustments: state.adjustments,
            last_adjusted_at: state.last_adjusted_at,
            running,
        }
    }
}

/// Base price × class multiplier × complexity clamped to `[0.5, 3.0]`.
/// NaN complexity counts as baseline; infinities clamp like any other value.
pub fn price_job(base_price: f64, class: JobClass, complexity: f64) -> f64 {
    let complexity = if complexity.is_nan() {
        1.0
    } else {
        complexity.clamp(MIN_COMPLEXITY, MAX_COMPLEXITY)
    };
    base_price * class.price_multiplier() * complexity
}

async fn adjust_price(config: &PricingConfig, state: &RwLock<PriceState>) -> f64 {
    let mut state = state.write().await;

    let util_error = state.utilization - config.target_utilization;
    let queue_error =
        (state.queue_time_secs - config.target_queue_time_secs) / config.target_queue_time_secs;
    let adjustment = config.alpha * util_error + config.beta * queue_error;

    let old_price = state.current_price;
    let new_price = (old_price * (1.0 + adjustment)).clamp(config.min_price, config.max_price);

    state.current_price = new_price;
    state.adjustments += 1;
    state.last_adjusted_at = Some(Utc::now());

    info!(
        old_price,
        new_price,
        util_error,
        queue_error,
        adjustment,
        "💰 Price adjusted"
    );

    new_price
}

async fn adjustment_loop(
    config: PricingConfig,
    state: Arc<RwLock<PriceState>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let period = config.adjustment_interval();
    // First cycle one full interval after start
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                adjust_price(&config, &state).await;
            }
            changed = shutdown_rx.changed() => {
                // Err: sender dropped along with the controller
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("Price adjustment loop exiting");
                    break;
                }
            }
        }
    }
}
