use serde::{Deserialize, Serialize};

/// Sentinel used when an outcome does not name a model or billing account.
pub const UNKNOWN: &str = "unknown";

// ---------------------------------------------------------------------------
// RequestOutcome
// ---------------------------------------------------------------------------

/// Result of one completed chat request, as reported by the dispatcher.
///
/// Every field is optional on the wire. An outcome that carries neither
/// `success: true` nor an absent `error` counts as a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock processing time in seconds.
    #[serde(default)]
    pub processing_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_account: Option<String>,
    /// Fallback attempts consumed while serving this request.
    #[serde(default)]
    pub fallback_count: u32,
    #[serde(default)]
    pub quota_warnings: Vec<String>,
}

impl RequestOutcome {
    /// A successful outcome served by `model` and billed to `billing_account`.
    pub fn succeeded(
        model: impl Into<String>,
        billing_account: impl Into<String>,
        processing_time: f64,
    ) -> Self {
        Self {
            success: true,
            processing_time,
            model_used: Some(model.into()),
            billing_account: Some(billing_account.into()),
            ..Self::default()
        }
    }

    /// A failed outcome carrying the dispatcher's error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_fallbacks(mut self, count: u32) -> Self {
        self.fallback_count = count;
        self
    }

    pub fn with_quota_warning(mut self, warning: impl Into<String>) -> Self {
        self.quota_warnings.push(warning.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.success && self.error.is_none()
    }

    /// Model identifier, or [`UNKNOWN`] when absent or blank.
    pub fn model_id(&self) -> &str {
        non_blank(self.model_used.as_deref())
    }

    /// Billing account identifier, or [`UNKNOWN`] when absent or blank.
    pub fn billing_account_id(&self) -> &str {
        non_blank(self.billing_account.as_deref())
    }

    /// Processing time clamped to a finite, non-negative number of seconds.
    pub fn latency_secs(&self) -> f64 {
        if self.processing_time.is_finite() {
            self.processing_time.max(0.0)
        } else {
            0.0
        }
    }
}

fn non_blank(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => UNKNOWN,
    }
}

// ---------------------------------------------------------------------------
// Model health
// ---------------------------------------------------------------------------

/// Supplies the model-health block embedded verbatim in reports.
pub trait ModelHealthSource: Send + Sync {
    fn model_status(&self) -> serde_json::Value;
}

/// A fixed JSON document is its own health snapshot.
impl ModelHealthSource for serde_json::Value {
    fn model_status(&self) -> serde_json::Value {
        self.clone()
    }
}
