use ahash::AHashMap;
use mb_core::types::RequestOutcome;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

// ---------------------------------------------------------------------------
// AggregateCounters
// ---------------------------------------------------------------------------

/// Running totals since process start. Never reset.
///
/// `requests_total == requests_successful + requests_failed`, and each usage
/// map sums to `requests_successful`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateCounters {
    pub requests_total: u64,
    pub requests_successful: u64,
    pub requests_failed: u64,
    pub fallbacks_triggered: u64,
    pub quota_warnings: u64,
    /// Exact mean latency (seconds) over successful requests.
    pub avg_response_time: f64,
    pub model_usage: AHashMap<String, u64>,
    pub billing_account_usage: AHashMap<String, u64>,
}

impl AggregateCounters {
    fn apply(&mut self, outcome: &RequestOutcome) {
        self.requests_total += 1;

        if outcome.is_success() {
            self.requests_successful += 1;
            let n = self.requests_successful as f64;
            self.avg_response_time =
                (self.avg_response_time * (n - 1.0) + outcome.latency_secs()) / n;
            *self
                .model_usage
                .entry(outcome.model_id().to_string())
                .or_insert(0) += 1;
            *self
                .billing_account_usage
                .entry(outcome.billing_account_id().to_string())
                .or_insert(0) += 1;
        } else {
            self.requests_failed += 1;
        }

        self.fallbacks_triggered += u64::from(outcome.fallback_count);
        self.quota_warnings += outcome.quota_warnings.len() as u64;
    }

    /// Denominator shared by every rate: `max(requests_total, 1)`.
    pub fn rate_base(&self) -> f64 {
        self.requests_total.max(1) as f64
    }

    /// `requests_successful / max(requests_total, 1)` as a fraction.
    pub fn success_ratio(&self) -> f64 {
        self.requests_successful as f64 / self.rate_base()
    }

    /// `fallbacks_triggered / max(requests_total, 1)` as a fraction.
    pub fn fallback_ratio(&self) -> f64 {
        self.fallbacks_triggered as f64 / self.rate_base()
    }
}

// ---------------------------------------------------------------------------
// MetricsAggregator
// ---------------------------------------------------------------------------

/// Shared sink for request outcomes.
///
/// Every `record` runs under one write guard so readers never see a torn
/// update; `snapshot` clones under a read guard.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    counters: RwLock<AggregateCounters>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &RequestOutcome) {
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        counters.apply(outcome);
        tracing::trace!(
            total = counters.requests_total,
            success = outcome.is_success(),
            model = outcome.model_id(),
            "outcome recorded"
        );
    }

    /// Consistent copy of all counters.
    pub fn snapshot(&self) -> AggregateCounters {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
