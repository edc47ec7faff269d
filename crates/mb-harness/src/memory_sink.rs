use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mb_core::config::{Config, CredentialProvider};
use serde_json::{json, Value};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum MemorySinkError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote returned status {0}")]
    Status(u16),
}

/// Best-effort remote persistence for planning records.
///
/// `persist` never fails the caller: `true` means the remote accepted the
/// record, `false` means it was not stored.
#[async_trait]
pub trait MemorySink: Send + Sync {
    async fn persist(&self, entity_type: &str, data: &Value) -> bool;
}

/// Sink used when remote memory is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl MemorySink for NoopSink {
    async fn persist(&self, entity_type: &str, _data: &Value) -> bool {
        debug!(entity_type, "memory sink disabled, record kept local");
        false
    }
}

/// Mem0 upload client: POSTs `{ "type", "data" }` with a bearer key.
#[derive(Debug, Clone)]
pub struct Mem0Client {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl Mem0Client {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MemorySinkError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub async fn upload(&self, entity_type: &str, data: &Value) -> Result<(), MemorySinkError> {
        let resp = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "type": entity_type, "data": data }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(MemorySinkError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl MemorySink for Mem0Client {
    async fn persist(&self, entity_type: &str, data: &Value) -> bool {
        match self.upload(entity_type, data).await {
            Ok(()) => {
                debug!(entity_type, "record persisted to mem0");
                true
            }
            Err(e) => {
                warn!(entity_type, error = %e, "mem0 upload failed, falling back to local store");
                false
            }
        }
    }
}

/// Build the configured sink: Mem0 when enabled, otherwise [`NoopSink`].
pub fn sink_from_config(cfg: &Config) -> Result<Arc<dyn MemorySink>, MemorySinkError> {
    if !cfg.mem0.enabled {
        return Ok(Arc::new(NoopSink));
    }
    let key = CredentialProvider::mem0_api_key(&cfg.credentials).unwrap_or_default();
    if key.is_empty() {
        warn!(
            env = %cfg.credentials.mem0_api_key_env,
            "mem0 enabled without an API key; uploads will likely be rejected"
        );
    }
    let client = Mem0Client::new(
        cfg.mem0.api_url.clone(),
        key,
        Duration::from_secs(cfg.mem0.timeout_secs),
    )?;
    Ok(Arc::new(client))
}
