use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from `~/.mama-bear/config.toml`.
///
/// **Security**: API keys are never stored here. Sections that need a
/// credential hold the *name* of the env var to read; see
/// [`CredentialProvider`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Per-key usage ceilings. Keys without an entry are unconstrained.
    #[serde(default)]
    pub quota: BTreeMap<String, f64>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mem0: Mem0Config,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl Config {
    /// Load config from `~/.mama-bear/config.toml`, falling back to
    /// defaults when the file does not exist. Env overrides are applied
    /// before validation.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let mut cfg = if path.exists() {
            Self::parse_file(&path)?
        } else {
            Config::default()
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path: PathBuf = path.into();
        let mut cfg = Self::parse_file(&path)?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Overlay `LOG_LEVEL` and `MEM0_API_URL` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Overlay values from an arbitrary lookup (the environment in production).
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(level) = present("LOG_LEVEL") {
            self.general.log_level = level.to_lowercase();
        }
        if let Some(url) = present("MEM0_API_URL") {
            self.mem0.api_url = url;
        }
    }

    /// Semantic validation for settings that are not expressible via types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.credentials.validate()?;
        self.models.validate()?;
        self.fallback.validate()?;
        self.health.validate()?;
        self.performance.validate()?;
        self.monitoring.validate()?;
        for (key, limit) in &self.quota {
            if !limit.is_finite() || *limit < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "quota.{key} must be a non-negative number, got {limit}"
                )));
            }
        }
        Ok(())
    }

    /// Path of the planning database with a leading `~` expanded.
    pub fn database_path(&self) -> PathBuf {
        expand_home(&self.database.path)
    }

    fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mama-bear")
            .join("config.toml")
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl GeneralConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.log_format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(invalid(format!(
                "general.log_format must be 'pretty' or 'json', got '{other}'"
            ))),
        }
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}

fn default_service_name() -> String {
    "mama-bear".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}

/// Env var names for model and memory credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_gemini_primary_env")]
    pub gemini_primary_env: String,
    #[serde(default = "default_gemini_backup_env")]
    pub gemini_backup_env: String,
    #[serde(default = "default_mem0_key_env")]
    pub mem0_api_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            gemini_primary_env: default_gemini_primary_env(),
            gemini_backup_env: default_gemini_backup_env(),
            mem0_api_key_env: default_mem0_key_env(),
        }
    }
}

impl CredentialsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("gemini_primary_env", &self.gemini_primary_env),
            ("gemini_backup_env", &self.gemini_backup_env),
            ("mem0_api_key_env", &self.mem0_api_key_env),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(format!("credentials.{field} must not be empty")));
            }
        }
        Ok(())
    }
}

fn default_gemini_primary_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_backup_env() -> String {
    "GEMINI_API_KEY_BACKUP".into()
}
fn default_mem0_key_env() -> String {
    "MEM0_API_KEY".into()
}

/// Default sampling parameters for model calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub default_top_p: f64,
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            default_top_p: default_top_p(),
            default_top_k: default_top_k(),
        }
    }
}

impl ModelsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(invalid(format!(
                "models.default_temperature must be within [0, 2], got {}",
                self.default_temperature
            )));
        }
        if !(self.default_top_p > 0.0 && self.default_top_p <= 1.0) {
            return Err(invalid(format!(
                "models.default_top_p must be within (0, 1], got {}",
                self.default_top_p
            )));
        }
        Ok(())
    }
}

fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_top_p() -> f64 {
    0.95
}
fn default_top_k() -> u32 {
    64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Fraction of a quota held back before a key counts as near its limit.
    #[serde(default = "default_quota_safety_margin")]
    pub quota_safety_margin: f64,
    #[serde(default = "default_max_fallback_attempts")]
    pub max_fallback_attempts: u32,
    #[serde(default = "default_base_fallback_delay")]
    pub base_fallback_delay_secs: f64,
    #[serde(default = "default_max_fallback_delay")]
    pub max_fallback_delay_secs: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            quota_safety_margin: default_quota_safety_margin(),
            max_fallback_attempts: default_max_fallback_attempts(),
            base_fallback_delay_secs: default_base_fallback_delay(),
            max_fallback_delay_secs: default_max_fallback_delay(),
        }
    }
}

impl FallbackConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.quota_safety_margin) {
            return Err(invalid(format!(
                "fallback.quota_safety_margin must be within [0, 1), got {}",
                self.quota_safety_margin
            )));
        }
        if self.base_fallback_delay_secs < 0.0
            || self.base_fallback_delay_secs > self.max_fallback_delay_secs
        {
            return Err(invalid(format!(
                "fallback.base_fallback_delay_secs ({}) must be non-negative and <= max_fallback_delay_secs ({})",
                self.base_fallback_delay_secs, self.max_fallback_delay_secs
            )));
        }
        Ok(())
    }
}

fn default_quota_safety_margin() -> f64 {
    0.1
}
fn default_max_fallback_attempts() -> u32 {
    6
}
fn default_base_fallback_delay() -> f64 {
    1.0
}
fn default_max_fallback_delay() -> f64 {
    30.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_check_interval")]
    pub check_interval_secs: u64,
    /// Consecutive errors before a model is marked unhealthy.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
    /// Seconds after the last failure before an unhealthy model may be retried.
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_health_check_interval(),
            error_threshold: default_error_threshold(),
            recovery_timeout_secs: default_recovery_timeout(),
        }
    }
}

impl HealthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.error_threshold == 0 {
            return Err(invalid("health.error_threshold must be at least 1"));
        }
        Ok(())
    }
}

fn default_health_check_interval() -> u64 {
    300
}
fn default_error_threshold() -> u32 {
    3
}
fn default_recovery_timeout() -> u64 {
    1800
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_true")]
    pub enable_request_batching: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_true")]
    pub enable_response_caching: bool,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            enable_request_batching: true,
            batch_size: default_batch_size(),
            enable_response_caching: true,
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl PerformanceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(invalid("performance.batch_size must be at least 1"));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_batch_size() -> u32 {
    5
}
fn default_cache_ttl() -> u64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub log_model_usage: bool,
    #[serde(default = "default_true")]
    pub log_quota_warnings: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_model_usage: true,
            log_quota_warnings: true,
        }
    }
}

/// Intervals for the history roller and the periodic report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_roll_interval")]
    pub roll_interval_secs: u64,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            roll_interval_secs: default_roll_interval(),
            retention_hours: default_retention_hours(),
            report_interval_secs: default_report_interval(),
        }
    }
}

impl MonitoringConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.roll_interval_secs == 0 {
            return Err(invalid("monitoring.roll_interval_secs must be at least 1"));
        }
        if self.retention_hours == 0 {
            return Err(invalid("monitoring.retention_hours must be at least 1"));
        }
        if self.report_interval_secs == 0 {
            return Err(invalid("monitoring.report_interval_secs must be at least 1"));
        }
        Ok(())
    }
}

fn default_roll_interval() -> u64 {
    3600
}
fn default_retention_hours() -> u32 {
    24
}
fn default_report_interval() -> u64 {
    86_400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "~/.mama-bear/planning.db".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mem0Config {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_mem0_url")]
    pub api_url: String,
    #[serde(default = "default_mem0_timeout")]
    pub timeout_secs: u64,
}

impl Default for Mem0Config {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_mem0_url(),
            timeout_secs: default_mem0_timeout(),
        }
    }
}

fn default_mem0_url() -> String {
    "https://your-mem0-endpoint/upload".into()
}
fn default_mem0_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_daemon_host")]
    pub host: String,
    #[serde(default = "default_daemon_port")]
    pub port: u16,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_daemon_host(),
            port: default_daemon_port(),
        }
    }
}

fn default_daemon_host() -> String {
    "127.0.0.1".into()
}
fn default_daemon_port() -> u16 {
    5000
}

// ---------------------------------------------------------------------------
// CredentialProvider
// ---------------------------------------------------------------------------

/// Resolves credentials from the environment at runtime.
pub struct CredentialProvider;

impl CredentialProvider {
    /// Read a non-empty value from the env var called `env_name`.
    pub fn resolve(env_name: &str) -> Option<String> {
        std::env::var(env_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    pub fn gemini_primary(cfg: &CredentialsConfig) -> Option<String> {
        Self::resolve(&cfg.gemini_primary_env)
    }

    pub fn gemini_backup(cfg: &CredentialsConfig) -> Option<String> {
        Self::resolve(&cfg.gemini_backup_env)
    }

    pub fn mem0_api_key(cfg: &CredentialsConfig) -> Option<String> {
        Self::resolve(&cfg.mem0_api_key_env)
    }
}
