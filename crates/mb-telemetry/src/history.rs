use chrono::{Local, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::metrics::MetricsAggregator;

/// Hour-resolution bucket label. Sorts lexically in chronological order.
pub const LABEL_FORMAT: &str = "%Y-%m-%d_%H";

pub const DEFAULT_RETENTION_HOURS: u32 = 24;

/// Rates captured from the running counters at roll time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub requests: u64,
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub fallback_rate: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("retention window of {hours}h cannot be subtracted from {now}")]
    CutoffOutOfRange { now: NaiveDateTime, hours: u32 },
}

pub fn bucket_label(at: NaiveDateTime) -> String {
    at.format(LABEL_FORMAT).to_string()
}

/// Snapshots the aggregator into hourly buckets and prunes anything that
/// falls outside the retention window.
pub struct HistoryRoller {
    aggregator: Arc<MetricsAggregator>,
    retention_hours: u32,
    history: RwLock<BTreeMap<String, HourlyBucket>>,
}

impl HistoryRoller {
    pub fn new(aggregator: Arc<MetricsAggregator>, retention_hours: u32) -> Self {
        Self {
            aggregator,
            retention_hours: retention_hours.max(1),
            history: RwLock::new(BTreeMap::new()),
        }
    }

    /// Roll using the local wall clock.
    pub fn roll_now(&self) -> Result<String, HistoryError> {
        self.roll_at(Local::now().naive_local())
    }

    /// Write the bucket for `now`'s hour (replacing any earlier write in the
    /// same hour) and drop every label at or before `now - retention`.
    ///
    /// Returns the label written.
    pub fn roll_at(&self, now: NaiveDateTime) -> Result<String, HistoryError> {
        let cutoff = now
            .checked_sub_signed(TimeDelta::hours(i64::from(self.retention_hours)))
            .map(bucket_label)
            .ok_or(HistoryError::CutoffOutOfRange {
                now,
                hours: self.retention_hours,
            })?;

        let counters = self.aggregator.snapshot();
        let bucket = HourlyBucket {
            requests: counters.requests_total,
            success_rate: counters.success_ratio(),
            avg_response_time: counters.avg_response_time,
            fallback_rate: counters.fallback_ratio(),
        };
        let label = bucket_label(now);

        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        history.insert(label.clone(), bucket);
        history.retain(|k, _| k.as_str() > cutoff.as_str());

        tracing::debug!(
            label = %label,
            retained = history.len(),
            requests = bucket.requests,
            "hourly metrics rolled"
        );
        Ok(label)
    }

    /// Copy of the retained buckets, oldest first.
    pub fn history(&self) -> BTreeMap<String, HourlyBucket> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn retention_hours(&self) -> u32 {
        self.retention_hours
    }
}
