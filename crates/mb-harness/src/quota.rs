use std::collections::BTreeMap;

use dashmap::DashMap;
use mb_core::config::Config;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaStatus {
    Within,
    Exceeded,
}

impl QuotaStatus {
    pub fn is_exceeded(self) -> bool {
        self == QuotaStatus::Exceeded
    }
}

/// Cumulative usage per resource key, checked against configured ceilings.
///
/// Totals only ever grow. Keys without a configured limit are unconstrained.
#[derive(Debug, Default)]
pub struct UsageLedger {
    usage: DashMap<String, f64>,
    limits: BTreeMap<String, f64>,
    safety_margin: f64,
}

impl UsageLedger {
    pub fn new(limits: BTreeMap<String, f64>, safety_margin: f64) -> Self {
        Self {
            usage: DashMap::new(),
            limits,
            safety_margin: safety_margin.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.quota.clone(), cfg.fallback.quota_safety_margin)
    }

    /// Add `amount` to `key`'s running total.
    pub fn record_usage(&self, key: &str, amount: f64) {
        if !amount.is_finite() || amount < 0.0 {
            warn!(key, amount, "ignoring invalid usage amount");
            return;
        }
        let mut total = self.usage.entry(key.to_string()).or_insert(0.0);
        *total += amount;
        debug!(key, amount, total = *total, "usage recorded");
    }

    /// Copy of every key's total.
    pub fn get_status(&self) -> BTreeMap<String, f64> {
        self.usage
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    pub fn usage(&self, key: &str) -> f64 {
        self.usage.get(key).map(|v| *v).unwrap_or(0.0)
    }

    pub fn limit(&self, key: &str) -> Option<f64> {
        self.limits.get(key).copied()
    }

    /// `Exceeded` once usage reaches the configured limit. Read-only.
    pub fn check_quota(&self, key: &str) -> QuotaStatus {
        let Some(limit) = self.limit(key) else {
            return QuotaStatus::Within;
        };
        let used = self.usage(key);
        if used >= limit {
            warn!(key, used, limit, "quota exceeded");
            QuotaStatus::Exceeded
        } else {
            QuotaStatus::Within
        }
    }

    /// True once usage enters the safety margin below the limit.
    pub fn is_near_limit(&self, key: &str) -> bool {
        self.limit(key)
            .is_some_and(|limit| self.usage(key) >= limit * (1.0 - self.safety_margin))
    }

    /// Log and return the full usage map.
    pub fn daily_briefing(&self) -> BTreeMap<String, f64> {
        let status = self.get_status();
        let exceeded: Vec<&str> = status
            .keys()
            .filter(|k| self.check_quota(k).is_exceeded())
            .map(String::as_str)
            .collect();
        info!(usage = ?status, exceeded = ?exceeded, "daily quota briefing");
        status
    }
}
