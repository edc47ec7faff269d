use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use mb_core::config::{Config, CredentialProvider};
use mb_core::planning::PlanningStore;
use mb_core::types::{RequestOutcome, UNKNOWN};
use mb_harness::health::ModelHealthTracker;
use mb_harness::memory_sink::{sink_from_config, MemorySink};
use mb_harness::quota::UsageLedger;
use mb_harness::shutdown::{DrainResult, ShutdownSignal};
use mb_telemetry::history::HistoryRoller;
use mb_telemetry::metrics::MetricsAggregator;
use mb_telemetry::report::ReportGenerator;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::http_api::{api_router, ApiState};

/// Background loops that confirm drain on stop.
const LOOP_COUNT: usize = 2;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Loop periods. Defaults come from `[monitoring]`.
#[derive(Debug, Clone)]
pub struct DaemonIntervals {
    pub roll: Duration,
    pub report: Duration,
}

impl DaemonIntervals {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            roll: Duration::from_secs(cfg.monitoring.roll_interval_secs),
            report: Duration::from_secs(cfg.monitoring.report_interval_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// The monitoring core shared by the HTTP layer and the background loops.
pub struct Monitor {
    pub aggregator: Arc<MetricsAggregator>,
    pub roller: Arc<HistoryRoller>,
    pub reporter: ReportGenerator,
    pub ledger: UsageLedger,
    pub health: Arc<ModelHealthTracker>,
    log_model_usage: bool,
    log_quota_warnings: bool,
}

impl Monitor {
    pub fn from_config(cfg: &Config) -> Self {
        let aggregator = Arc::new(MetricsAggregator::new());
        let roller = Arc::new(HistoryRoller::new(
            Arc::clone(&aggregator),
            cfg.monitoring.retention_hours,
        ));
        let health = Arc::new(ModelHealthTracker::from_config(&cfg.health));
        let reporter = ReportGenerator::new(
            Arc::clone(&aggregator),
            Arc::clone(&roller),
            Arc::clone(&health) as Arc<dyn mb_core::types::ModelHealthSource>,
        );
        Self {
            aggregator,
            roller,
            reporter,
            ledger: UsageLedger::from_config(cfg),
            health,
            log_model_usage: cfg.logging.log_model_usage,
            log_quota_warnings: cfg.logging.log_quota_warnings,
        }
    }

    /// Feed one completed request through health, quota and the aggregator.
    pub fn ingest(&self, mut outcome: RequestOutcome) {
        let model = outcome.model_id().to_string();
        let success = outcome.is_success();

        if model != UNKNOWN {
            if success {
                self.health.record_success(&model);
            } else {
                self.health.record_failure(&model);
            }
        }

        if success {
            self.ledger.record_usage(&model, 1.0);
            if self.ledger.is_near_limit(&model) {
                let used = self.ledger.usage(&model);
                if self.log_quota_warnings {
                    warn!(model = %model, used, "quota near limit");
                }
                outcome
                    .quota_warnings
                    .push(format!("quota near limit for {model}"));
            }
        }

        if self.log_model_usage {
            debug!(
                model = %model,
                billing_account = outcome.billing_account_id(),
                success,
                processing_time = outcome.latency_secs(),
                "model usage"
            );
        }

        self.aggregator.record(&outcome);
    }

    /// One roll of the hourly history.
    pub fn roll(&self) -> Result<()> {
        let label = self.roller.roll_now().context("hourly roll failed")?;
        debug!(label = %label, "history rolled");
        Ok(())
    }

    /// Build the daily report, log it, and log the quota briefing.
    pub fn daily_report(&self) -> Result<()> {
        let report = self.reporter.generate_report();
        let body = serde_json::to_string_pretty(&report).context("serialize daily report")?;
        info!("Daily Mama Bear Report:\n{body}");
        self.ledger.daily_briefing();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Owns the monitoring core, the planning store and the loop lifecycle.
pub struct Daemon {
    config: Config,
    monitor: Arc<Monitor>,
    api_state: Arc<ApiState>,
    intervals: DaemonIntervals,
    shutdown: ShutdownSignal,
    started: AtomicBool,
}

impl Daemon {
    /// Build a daemon around an already-open store and sink.
    pub fn with_parts(config: Config, store: PlanningStore, sink: Arc<dyn MemorySink>) -> Self {
        let monitor = Arc::new(Monitor::from_config(&config));
        let api_state = Arc::new(ApiState::new(Arc::clone(&monitor), Arc::new(store), sink));
        Self {
            intervals: DaemonIntervals::from_config(&config),
            config,
            monitor,
            api_state,
            shutdown: ShutdownSignal::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Open the planning database and memory sink named by the config.
    pub async fn new(config: Config) -> Result<Self> {
        let db_path = config.database_path();
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let store = PlanningStore::new(&db_path)
            .await
            .with_context(|| format!("failed to open planning database {}", db_path.display()))?;
        let sink = sink_from_config(&config).context("failed to build memory sink")?;
        Ok(Self::with_parts(config, store, sink))
    }

    pub fn set_intervals(&mut self, intervals: DaemonIntervals) {
        self.intervals = intervals;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    pub fn api_state(&self) -> &Arc<ApiState> {
        &self.api_state
    }

    pub fn router(&self) -> axum::Router {
        api_router(Arc::clone(&self.api_state))
    }

    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn ingest(&self, outcome: RequestOutcome) {
        self.monitor.ingest(outcome);
    }

    /// Spawn the roll and daily-report loops. Only the first call spawns.
    pub fn start(&self) {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("monitoring loops already started");
            return;
        }
        self.log_credentials();
        info!(
            roll_secs = self.intervals.roll.as_secs_f64(),
            report_secs = self.intervals.report.as_secs_f64(),
            "starting monitoring loops"
        );

        let monitor = Arc::clone(&self.monitor);
        tokio::spawn(run_periodic(
            "roll",
            self.intervals.roll,
            self.shutdown.clone(),
            move || monitor.roll(),
        ));

        let monitor = Arc::clone(&self.monitor);
        tokio::spawn(run_periodic(
            "daily_report",
            self.intervals.report,
            self.shutdown.clone(),
            move || monitor.daily_report(),
        ));
    }

    /// Stop scheduling ticks and wait for both loops to exit.
    ///
    /// A daemon that never started has nothing to drain and returns at once.
    pub async fn stop(&self) -> DrainResult {
        self.shutdown.trigger();
        if !self.started.load(Ordering::Acquire) {
            return DrainResult::Complete(self.shutdown.drained());
        }
        self.shutdown.wait_for_drain(LOOP_COUNT, DRAIN_TIMEOUT).await
    }

    fn log_credentials(&self) {
        let creds = &self.config.credentials;
        if CredentialProvider::gemini_primary(creds).is_none() {
            warn!(
                env = %creds.gemini_primary_env,
                "primary API key not set, limited model access"
            );
        }
        if CredentialProvider::gemini_backup(creds).is_none() {
            warn!(
                env = %creds.gemini_backup_env,
                "backup API key not set, limited failover capability"
            );
        }
    }
}

/// Tick `task` every `period` until shutdown.
///
/// The first immediate tick is consumed. A tick runs to completion before the
/// next is awaited; late ticks are delayed, never run concurrently. Errors are
/// logged and the loop keeps going.
async fn run_periodic<F, E>(name: &'static str, period: Duration, shutdown: ShutdownSignal, task: F)
where
    F: Fn() -> std::result::Result<(), E> + Send + 'static,
    E: Display,
{
    let _guard = shutdown.guard();
    let mut stop = shutdown.subscribe();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let started = Instant::now();
                match task() {
                    Ok(()) => debug!(task = name, elapsed_ms = started.elapsed().as_millis() as u64, "tick completed"),
                    Err(e) => error!(task = name, error = %e, "tick failed"),
                }
            }
            _ = stop.recv() => {
                info!(task = name, "shutdown signal received, stopping loop");
                break;
            }
        }
    }
}
