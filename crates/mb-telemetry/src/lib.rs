//! Observability and monitoring for the Mama Bear backend.
//!
//! Key components:
//! - **Logging**: Human-readable and JSON-formatted output via `tracing-subscriber`
//! - **Tracing**: `X-Request-Id` middleware for axum
//! - **Metrics**: `MetricsAggregator`, the running counters fed by every request outcome
//! - **History**: `HistoryRoller`, hourly snapshots of the counters with retention
//! - **Report**: `ReportGenerator`, rates, usage distribution and recommendations

pub mod history;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod tracing_setup;
