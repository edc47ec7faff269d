use chrono::{DateTime, Utc};
use mb_core::types::ModelHealthSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::history::{HistoryRoller, HourlyBucket};
use crate::metrics::{AggregateCounters, MetricsAggregator};

pub const REPORT_PERIOD: &str = "24h";

const MIN_SUCCESS_RATE_PCT: f64 = 95.0;
const MAX_FALLBACK_RATE_PCT: f64 = 20.0;
const MAX_AVG_RESPONSE_SECS: f64 = 5.0;
const MAX_QUOTA_WARNING_RATIO: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_requests: u64,
    /// Percent, 0..=100.
    pub success_rate: f64,
    pub average_response_time: f64,
    /// Percent; may exceed 100 when requests fall back more than once.
    pub fallback_rate: f64,
    pub quota_warnings: u64,
}

/// Usage count and its share of *all* requests (failures included).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageShare {
    pub usage_count: u64,
    pub usage_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub timestamp: DateTime<Utc>,
    pub period: String,
    pub summary: ReportSummary,
    pub model_performance: BTreeMap<String, UsageShare>,
    pub billing_distribution: BTreeMap<String, UsageShare>,
    pub model_health: serde_json::Value,
    pub recommendations: Vec<String>,
}

/// Running counters plus the retained hourly buckets.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentMetrics {
    #[serde(flatten)]
    pub counters: AggregateCounters,
    pub hourly_stats: BTreeMap<String, HourlyBucket>,
}

/// Pull-model reporter; every call reads live state.
pub struct ReportGenerator {
    aggregator: Arc<MetricsAggregator>,
    roller: Arc<HistoryRoller>,
    health: Arc<dyn ModelHealthSource>,
}

impl ReportGenerator {
    pub fn new(
        aggregator: Arc<MetricsAggregator>,
        roller: Arc<HistoryRoller>,
        health: Arc<dyn ModelHealthSource>,
    ) -> Self {
        Self {
            aggregator,
            roller,
            health,
        }
    }

    pub fn current_metrics(&self) -> CurrentMetrics {
        CurrentMetrics {
            counters: self.aggregator.snapshot(),
            hourly_stats: self.roller.history(),
        }
    }

    pub fn generate_report(&self) -> DailyReport {
        build_report(&self.aggregator.snapshot(), self.health.model_status())
    }
}

/// Derive a report from one consistent counter snapshot.
pub fn build_report(counters: &AggregateCounters, model_health: serde_json::Value) -> DailyReport {
    let base = counters.rate_base();
    let shares = |usage: &ahash::AHashMap<String, u64>| {
        usage
            .iter()
            .map(|(id, &count)| {
                (
                    id.clone(),
                    UsageShare {
                        usage_count: count,
                        usage_percentage: count as f64 / base * 100.0,
                    },
                )
            })
            .collect::<BTreeMap<_, _>>()
    };

    DailyReport {
        timestamp: Utc::now(),
        period: REPORT_PERIOD.to_string(),
        summary: ReportSummary {
            total_requests: counters.requests_total,
            success_rate: counters.success_ratio() * 100.0,
            average_response_time: counters.avg_response_time,
            fallback_rate: counters.fallback_ratio() * 100.0,
            quota_warnings: counters.quota_warnings,
        },
        model_performance: shares(&counters.model_usage),
        billing_distribution: shares(&counters.billing_account_usage),
        model_health,
        recommendations: recommendations(counters),
    }
}

/// Threshold checks, evaluated independently and in a fixed order.
pub fn recommendations(counters: &AggregateCounters) -> Vec<String> {
    let mut out = Vec::new();

    let success_rate = counters.success_ratio() * 100.0;
    if success_rate < MIN_SUCCESS_RATE_PCT {
        out.push(format!(
            "Success rate is {success_rate:.1}% - consider reviewing API key status and quotas"
        ));
    }

    let fallback_rate = counters.fallback_ratio() * 100.0;
    if fallback_rate > MAX_FALLBACK_RATE_PCT {
        out.push(format!(
            "High fallback rate ({fallback_rate:.1}%) - consider increasing quotas or adding more API keys"
        ));
    }

    if counters.avg_response_time > MAX_AVG_RESPONSE_SECS {
        out.push(format!(
            "Average response time is {:.2}s - consider optimizing model selection",
            counters.avg_response_time
        ));
    }

    if counters.model_usage.len() == 1 {
        out.push(
            "Only using one model - consider enabling additional models for better reliability"
                .to_string(),
        );
    }

    if counters.quota_warnings as f64 > counters.requests_total as f64 * MAX_QUOTA_WARNING_RATIO {
        out.push("High number of quota warnings - consider upgrading quota limits".to_string());
    }

    out
}
