use std::sync::Arc;
use std::time::Duration;

use mb_core::config::Config;
use mb_core::planning::PlanningStore;
use mb_core::types::RequestOutcome;
use mb_daemon::daemon::{Daemon, DaemonIntervals};
use mb_harness::health::HealthState;
use mb_harness::memory_sink::NoopSink;
use mb_harness::shutdown::DrainResult;

async fn daemon_with(config: Config) -> Daemon {
    let store = PlanningStore::new_in_memory().await.unwrap();
    Daemon::with_parts(config, store, Arc::new(NoopSink))
}

#[tokio::test]
async fn ingest_updates_counters_health_and_ledger() {
    let daemon = daemon_with(Config::default()).await;

    daemon.ingest(RequestOutcome::succeeded("gemini-pro", "primary", 2.0));
    daemon.ingest(RequestOutcome::succeeded("gemini-pro", "primary", 4.0));
    daemon.ingest(RequestOutcome::failed("quota exceeded"));

    let monitor = daemon.monitor();
    let c = monitor.aggregator.snapshot();
    assert_eq!(c.requests_total, 3);
    assert_eq!(c.requests_successful, 2);
    assert_eq!(c.avg_response_time, 3.0);
    assert_eq!(monitor.ledger.usage("gemini-pro"), 2.0);
    assert_eq!(monitor.health.state("gemini-pro"), HealthState::Healthy);
    // Failures without a model never touch health.
    assert!(monitor.health.views().iter().all(|(m, _)| m != "unknown"));
}

#[tokio::test]
async fn near_limit_adds_quota_warning() {
    let mut config = Config::default();
    config.quota.insert("gemini-flash".into(), 10.0);
    let daemon = daemon_with(config).await;

    for _ in 0..8 {
        daemon.ingest(RequestOutcome::succeeded("gemini-flash", "primary", 1.0));
    }
    assert_eq!(daemon.monitor().aggregator.snapshot().quota_warnings, 0);

    // 9 of 10 crosses the 10% safety margin.
    daemon.ingest(RequestOutcome::succeeded("gemini-flash", "primary", 1.0));
    assert_eq!(daemon.monitor().aggregator.snapshot().quota_warnings, 1);
}

#[tokio::test]
async fn repeated_failures_mark_model_unhealthy() {
    let daemon = daemon_with(Config::default()).await;
    for _ in 0..3 {
        let mut outcome = RequestOutcome::failed("500");
        outcome.model_used = Some("gemini-pro".into());
        daemon.ingest(outcome);
    }
    assert_eq!(
        daemon.monitor().health.state("gemini-pro"),
        HealthState::Unhealthy
    );
}

#[tokio::test]
async fn loops_roll_history_and_stop_cleanly() {
    let mut daemon = daemon_with(Config::default()).await;
    daemon.set_intervals(DaemonIntervals {
        roll: Duration::from_millis(20),
        report: Duration::from_millis(30),
    });
    daemon.ingest(RequestOutcome::succeeded("a", "b", 1.0));
    daemon.start();

    tokio::time::sleep(Duration::from_millis(150)).await;
    let history = daemon.monitor().roller.history();
    assert!(!history.is_empty());
    // Every roll lands in the current hour's bucket.
    assert!(history.len() <= 2);

    let drained = daemon.stop().await;
    assert!(drained.is_complete());
    assert!(daemon.shutdown_handle().is_shutting_down());

    // Stopping never touches recorded counters.
    assert_eq!(daemon.monitor().aggregator.snapshot().requests_total, 1);
}

#[tokio::test]
async fn stop_without_ticks_still_drains() {
    let daemon = daemon_with(Config::default()).await;
    daemon.start();
    let drained = daemon.stop().await;
    assert!(drained.is_complete());
    assert!(daemon.monitor().roller.history().is_empty());
}

#[tokio::test]
async fn new_creates_database_under_configured_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    let db_path = dir.path().join("nested").join("planning.db");
    config.database.path = db_path.to_string_lossy().into_owned();

    let daemon = Daemon::new(config).await.unwrap();
    assert!(db_path.exists());
    assert_eq!(daemon.config().daemon.port, 5000);
}

#[tokio::test]
async fn stop_before_start_returns_immediately() {
    let daemon = daemon_with(Config::default()).await;
    let drained = tokio::time::timeout(Duration::from_secs(1), daemon.stop())
        .await
        .expect("stop on an idle daemon must not wait for the drain timeout");
    assert!(drained.is_complete());
    assert!(daemon.shutdown_handle().is_shutting_down());
}

#[tokio::test]
async fn second_start_spawns_no_extra_loops() {
    let mut daemon = daemon_with(Config::default()).await;
    daemon.set_intervals(DaemonIntervals {
        roll: Duration::from_millis(20),
        report: Duration::from_millis(30),
    });
    daemon.start();
    daemon.start();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let drained = daemon.stop().await;
    assert_eq!(drained, DrainResult::Complete(2));
    // Let any stray loop exit before re-reading the counter.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(daemon.shutdown_handle().drained(), 2);
}
