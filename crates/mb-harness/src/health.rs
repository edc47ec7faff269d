use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mb_core::config::HealthConfig;
use mb_core::types::ModelHealthSource;
use serde::Serialize;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Serving normally.
    Healthy,
    /// Too many consecutive errors; skip this model.
    Unhealthy,
    /// Unhealthy, but the recovery timeout has passed so it may be retried.
    Recovering,
}

#[derive(Debug, Clone, Default)]
struct ModelHealth {
    unhealthy: bool,
    consecutive_errors: u32,
    successes: u64,
    failures: u64,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
}

/// Per-model view handed to the report.
#[derive(Debug, Clone, Serialize)]
pub struct ModelHealthView {
    pub status: HealthState,
    pub consecutive_errors: u32,
    pub successes: u64,
    pub failures: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// ModelHealthTracker
// ---------------------------------------------------------------------------

/// Consecutive-error tracking per model id.
#[derive(Debug)]
pub struct ModelHealthTracker {
    error_threshold: u32,
    recovery_timeout: Duration,
    models: DashMap<String, ModelHealth>,
}

impl ModelHealthTracker {
    pub fn new(error_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            error_threshold: error_threshold.max(1),
            recovery_timeout,
            models: DashMap::new(),
        }
    }

    pub fn from_config(cfg: &HealthConfig) -> Self {
        Self::new(
            cfg.error_threshold,
            Duration::from_secs(cfg.recovery_timeout_secs),
        )
    }

    pub fn record_success(&self, model: &str) {
        let mut entry = self.models.entry(model.to_string()).or_default();
        if entry.unhealthy {
            info!(model, "model recovered");
        }
        entry.unhealthy = false;
        entry.consecutive_errors = 0;
        entry.successes += 1;
        entry.last_success = Some(Utc::now());
    }

    pub fn record_failure(&self, model: &str) {
        let mut entry = self.models.entry(model.to_string()).or_default();
        entry.consecutive_errors += 1;
        entry.failures += 1;
        entry.last_failure = Some(Utc::now());
        if !entry.unhealthy && entry.consecutive_errors >= self.error_threshold {
            entry.unhealthy = true;
            warn!(
                model,
                consecutive_errors = entry.consecutive_errors,
                "model marked unhealthy"
            );
        }
    }

    pub fn state(&self, model: &str) -> HealthState {
        self.models
            .get(model)
            .map(|h| self.state_of(&h))
            .unwrap_or(HealthState::Healthy)
    }

    /// Healthy or recovering models may take traffic.
    pub fn is_available(&self, model: &str) -> bool {
        self.state(model) != HealthState::Unhealthy
    }

    pub fn views(&self) -> Vec<(String, ModelHealthView)> {
        let mut out: Vec<_> = self
            .models
            .iter()
            .map(|e| {
                let h = e.value();
                let view = ModelHealthView {
                    status: self.state_of(h),
                    consecutive_errors: h.consecutive_errors,
                    successes: h.successes,
                    failures: h.failures,
                    last_success: h.last_success,
                    last_failure: h.last_failure,
                };
                (e.key().clone(), view)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn state_of(&self, h: &ModelHealth) -> HealthState {
        if !h.unhealthy {
            return HealthState::Healthy;
        }
        let elapsed = h
            .last_failure
            .and_then(|t| (Utc::now() - t).to_std().ok())
            .unwrap_or_default();
        if elapsed >= self.recovery_timeout {
            HealthState::Recovering
        } else {
            HealthState::Unhealthy
        }
    }
}

impl ModelHealthSource for ModelHealthTracker {
    fn model_status(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .views()
            .into_iter()
            .map(|(model, view)| {
                (
                    model,
                    serde_json::to_value(view).unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }
}
