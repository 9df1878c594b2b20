//! Scheduler cadence, non-overlap and shutdown draining

use candlecast::config::Cadence;
use candlecast::core::http::HealthStatus;
use candlecast::core::scheduler::{CycleScheduler, SchedulerState};
use candlecast::jobs::types::{CycleReport, Stage, SymbolOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::test_utils::{hourly, symbol, ts, TestPipeline};

async fn wait_for_report(scheduler: &CycleScheduler, timeout: Duration) -> Option<CycleReport> {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if let Some(report) = scheduler.last_report().await {
            return Some(report);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

#[tokio::test]
async fn first_interval_cycle_runs_immediately_and_stop_halts_the_loop() {
    let pipeline = TestPipeline::new(&["BTC/USDT"], ts("2024-01-10T05:00:00Z"));
    pipeline
        .source
        .set_series(&symbol("BTC/USDT"), hourly(ts("2024-01-10T00:00:00Z"), 3, 1.0));

    let scheduler = CycleScheduler::new(pipeline.runtime.clone(), &Cadence::Interval(Duration::from_secs(60)))
        .expect("valid cadence");
    assert_eq!(scheduler.state().await, SchedulerState::Idle);

    scheduler.start().await;
    scheduler.start().await;
    assert!(scheduler.is_running().await);

    let report = wait_for_report(&scheduler, Duration::from_secs(2))
        .await
        .expect("first cycle ran without waiting for the interval");
    assert_eq!(report.completed(), 1);

    scheduler.stop().await;
    assert_eq!(scheduler.state().await, SchedulerState::Stopped);
    assert!(!scheduler.is_running().await);
    assert_eq!(pipeline.source.calls_for(&symbol("BTC/USDT")).len(), 1);

    // Stopped schedulers stay stopped.
    scheduler.start().await;
    assert!(!scheduler.is_running().await);
}

#[tokio::test]
async fn cycles_never_overlap_when_a_cycle_outlasts_the_cadence() {
    let pipeline = TestPipeline::new(&["BTC/USDT"], ts("2024-01-10T05:00:00Z"));
    pipeline
        .source
        .set_series(&symbol("BTC/USDT"), hourly(ts("2024-01-10T00:00:00Z"), 3, 1.0));
    pipeline.source.set_delay(Duration::from_millis(1_200));

    let scheduler = CycleScheduler::new(pipeline.runtime.clone(), &Cadence::Cron("* * * * * *".to_string()))
        .expect("valid cron");
    scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    scheduler.stop().await;

    assert!(!pipeline.source.calls_for(&symbol("BTC/USDT")).is_empty());
    assert_eq!(pipeline.source.max_in_flight(), 1);
}

#[tokio::test]
async fn stop_drains_the_current_stage_and_cancels_the_rest() {
    let pipeline = TestPipeline::new(&["BTC/USDT"], ts("2024-01-10T05:00:00Z"));
    let btc = symbol("BTC/USDT");
    pipeline.source.set_series(&btc, hourly(ts("2024-01-10T00:00:00Z"), 3, 1.0));
    pipeline.source.set_delay(Duration::from_millis(300));

    let scheduler = CycleScheduler::new(pipeline.runtime.clone(), &Cadence::Interval(Duration::from_secs(60)))
        .expect("valid cadence");
    scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.stop().await;

    let report = scheduler.last_report().await.expect("in-flight cycle drained");
    assert_eq!(
        report.outcome_for(&btc),
        Some(&SymbolOutcome::Cancelled {
            stage: Stage::WriteCandles
        })
    );
    assert_eq!(pipeline.source.calls_for(&btc).len(), 1);
    assert!(pipeline.store.candles(&btc).await.is_empty());
    assert!(pipeline.history_snapshot("BTC/USDT").is_none());
}

#[tokio::test]
async fn health_mirrors_scheduler_and_cycle_results() {
    let pipeline = TestPipeline::new(&["BTC/USDT", "ETH/USDT"], ts("2024-01-10T05:00:00Z"));
    pipeline
        .source
        .set_series(&symbol("BTC/USDT"), hourly(ts("2024-01-10T00:00:00Z"), 3, 1.0));
    pipeline.source.rate_limit(&symbol("ETH/USDT"));

    let health = Arc::new(RwLock::new(HealthStatus::default()));
    let scheduler = CycleScheduler::new(pipeline.runtime.clone(), &Cadence::Interval(Duration::from_secs(60)))
        .expect("valid cadence")
        .with_health(health.clone());
    scheduler.start().await;
    wait_for_report(&scheduler, Duration::from_secs(2))
        .await
        .expect("cycle ran");
    scheduler.stop().await;

    let health = health.read().await;
    assert_eq!(health.status, "degraded");
    assert_eq!(health.last_cycle_failures, 1);
    assert_eq!(health.last_cycle_at, Some(ts("2024-01-10T05:00:00Z")));
    assert_eq!(health.scheduler_state, SchedulerState::Stopped);
}

#[tokio::test]
async fn invalid_cadence_is_rejected() {
    let pipeline = TestPipeline::new(&["BTC/USDT"], ts("2024-01-10T05:00:00Z"));

    assert!(CycleScheduler::new(pipeline.runtime.clone(), &Cadence::Cron("every hour".to_string())).is_err());
    assert!(CycleScheduler::new(pipeline.runtime.clone(), &Cadence::Interval(Duration::ZERO)).is_err());
}
