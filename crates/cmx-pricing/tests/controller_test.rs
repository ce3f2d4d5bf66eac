use cmx_pricing::{price_job, PriceController, PricingConfig, PricingError};
use cmx_types::JobClass;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn controller() -> PriceController {
    PriceController::new(PricingConfig::default()).unwrap()
}

#[tokio::test]
async fn test_high_utilization_raises_price() {
    let controller = controller();
    controller.update_metrics(0.85, 60.0).await;

    let before = controller.current_price().await;
    let after = controller.run_adjustment_cycle().await;
    assert!(after > before, "{} should exceed {}", after, before);

    // α·0.15 = 0.015
    assert!((after - before * 1.015).abs() < 1e-9);
}

#[tokio::test]
async fn test_low_utilization_lowers_price() {
    let controller = controller();
    controller.update_metrics(0.40, 60.0).await;

    let before = controller.current_price().await;
    let after = controller.run_adjustment_cycle().await;
    assert!(after < before);
    assert!((after - before * 0.97).abs() < 1e-9);
}

#[tokio::test]
async fn test_queue_time_moves_price() {
    let long = controller();
    long.update_metrics(0.7, 120.0).await;
    let before = long.current_price().await;
    assert!(long.run_adjustment_cycle().await > before);

    let short = controller();
    short.update_metrics(0.7, 30.0).await;
    let before = short.current_price().await;
    assert!(short.run_adjustment_cycle().await < before);
}

#[tokio::test]
async fn test_price_on_target_is_stable() {
    let controller = controller();
    controller.update_metrics(0.7, 60.0).await;
    let before = controller.current_price().await;
    assert_eq!(controller.run_adjustment_cycle().await, before);
}

#[tokio::test]
async fn test_price_respects_bounds() {
    let config = PricingConfig {
        alpha: 5.0,
        beta: 5.0,
        ..Default::default()
    };

    let falling = PriceController::new(config.clone()).unwrap();
    falling.update_metrics(0.0, 0.0).await;
    for _ in 0..50 {
        falling.run_adjustment_cycle().await;
    }
    assert_eq!(falling.current_price().await, config.min_price);

    let rising = PriceController::new(config.clone()).unwrap();
    rising.update_metrics(1.0, 1e9).await;
    for _ in 0..50 {
        rising.run_adjustment_cycle().await;
    }
    assert_eq!(rising.current_price().await, config.max_price);
}

#[tokio::test]
async fn test_update_metrics_clamps_and_ignores_non_finite() {
    let controller = controller();
    controller.update_metrics(1.7, -5.0).await;
    let stats = controller.stats().await;
    assert_eq!(stats.utilization, 1.0);
    assert_eq!(stats.queue_time_secs, 0.0);

    controller.update_metrics(f64::NAN, f64::INFINITY).await;
    let stats = controller.stats().await;
    assert_eq!(stats.utilization, 1.0);
    assert_eq!(stats.queue_time_secs, 0.0);
}

#[tokio::test]
async fn test_quotes_by_class_and_complexity() {
    let controller = PriceController::new(PricingConfig {
        min_price: 1.0,
        max_price: 1.0,
        ..Default::default()
    })
    .unwrap();

    assert_eq!(controller.quote_job_price("standard", 1.0).await, 1.0);
    assert_eq!(controller.quote_job_price("premium", 1.0).await, 1.5);
    assert_eq!(controller.quote_job_price("enterprise", 1.0).await, 2.0);
    assert_eq!(controller.quote_job_price("bespoke", 1.0).await, 1.0);
    assert_eq!(controller.quote_job_price("premium", 2.0).await, 3.0);
    assert_eq!(controller.quote_job_price("standard", 0.1).await, 0.5);
    assert_eq!(controller.quote_job_price("standard", 100.0).await, 3.0);
    assert_eq!(controller.quote(JobClass::Enterprise, 3.0).await, 6.0);
}

#[tokio::test]
async fn test_quotes_do_not_mutate_state() {
    let controller = controller();
    let before = controller.stats().await;
    for _ in 0..10 {
        controller.quote(JobClass::Premium, 2.5).await;
    }
    assert_eq!(controller.stats().await, before);
}

#[tokio::test]
async fn test_invalid_config() {
    let result = PriceController::new(PricingConfig {
        min_price: 5.0,
        max_price: 1.0,
        ..Default::default()
    });
    assert!(matches!(result, Err(PricingError::InvalidConfiguration(_))));
}

#[tokio::test]
async fn test_unschedulable_interval_rejected_at_construction() {
    let result = PriceController::new(PricingConfig {
        adjustment_interval_secs: u64::MAX,
        ..Default::default()
    });
    assert!(matches!(result, Err(PricingError::InvalidConfiguration(_))));
}

#[test]
fn test_infinite_complexity_prices_at_bounds() {
    assert_eq!(price_job(1.0, JobClass::Enterprise, f64::INFINITY), 6.0);
    assert_eq!(price_job(1.0, JobClass::Enterprise, f64::NEG_INFINITY), 1.0);
    assert_eq!(price_job(1.0, JobClass::Enterprise, f64::NAN), 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_adjustment_loop_runs_on_interval() {
    let controller = controller();
    controller.update_metrics(0.9, 60.0).await;
    let initial = controller.current_price().await;

    controller.start().await;
    assert!(controller.is_running().await);

    // Nothing happens before the first interval elapses
    tokio::time::sleep(Duration::from_secs(299)).await;
    assert_eq!(controller.stats().await.adjustments, 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(controller.stats().await.adjustments, 1);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(controller.stats().await.adjustments, 3);
    assert!(controller.current_price().await > initial);

    controller.stop().await;
    assert!(!controller.is_running().await);

    tokio::time::sleep(Duration::from_secs(3000)).await;
    assert_eq!(controller.stats().await.adjustments, 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_immediate_and_repeatable() {
    let controller = controller();
    controller.stop().await;

    controller.start().await;
    controller.start().await;
    assert!(controller.is_running().await);

    // Does not wait for the 300 s interval
    tokio::time::timeout(Duration::from_secs(1), controller.stop())
        .await
        .expect("stop should not wait for the interval");
    controller.stop().await;
    assert!(!controller.is_running().await);

    controller.start().await;
    assert!(controller.stats().await.running);
    controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_drop_ends_loop() {
    let controller = controller();
    controller.start().await;
    drop(controller);
    tokio::time::sleep(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_access() {
    let controller = Arc::new(controller());
    let config = controller.config().clone();

    let mut handles = Vec::new();
    for i in 0..8 {
        let controller = controller.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..50 {
                match (i + j) % 3 {
                    0 => controller.update_metrics((j as f64) / 50.0, j as f64 * 3.0).await,
                    1 => {
                        controller.run_adjustment_cycle().await;
                    }
                    _ => {
                        let quote = controller.quote_job_price("premium", 1.0).await;
                        assert!(quote > 0.0);
                    }
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let price = controller.current_price().await;
    assert!(price >= config.min_price && price <= config.max_price);
}

#[tokio::test]
async fn test_stats_serialization() {
    let controller = controller();
    controller.update_metrics(0.75, 45.0).await;
    controller.run_adjustment_cycle().await;

    let json = serde_json::to_string(&controller.stats().await).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["utilization"], 0.75);
    assert_eq!(value["target_queue_time_secs"], 60.0);
    assert_eq!(value["adjustments"], 1);
    assert_eq!(value["running"], false);
}

proptest! {
    #[test]
    fn prop_price_stays_in_bounds(
        readings in prop::collection::vec((-10.0f64..10.0, -1e6f64..1e6), 1..40),
        alpha in 0.0f64..10.0,
        beta in 0.0f64..10.0,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let config = PricingConfig { alpha, beta, ..Default::default() };
        let controller = PriceController::new(config.clone()).unwrap();

        rt.block_on(async {
            for (u, q) in readings {
                controller.update_metrics(u, q).await;
                let price = controller.run_adjustment_cycle().await;
                prop_assert!(price >= config.min_price && price <= config.max_price);
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_quote_monotone(
        base in 0.001f64..10.0,
        c1 in 0.0f64..5.0,
        c2 in 0.0f64..5.0,
    ) {
        let (lo, hi) = if c1 <= c2 { (c1, c2) } else { (c2, c1) };
        for class in [JobClass::Standard, JobClass::Premium, JobClass::Enterprise] {
            prop_assert!(cmx_pricing::price_job(base, class, lo) <= cmx_pricing::price_job(base, class, hi));
        }
        prop_assert!(cmx_pricing::price_job(base, JobClass::Standard, lo)
            <= cmx_pricing::price_job(base, JobClass::Premium, lo));
        prop_assert!(cmx_pricing::price_job(base, JobClass::Premium, lo)
            <= cmx_pricing::price_job(base, JobClass::Enterprise, lo));
    }
}
