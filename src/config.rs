use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validation::ValidationPolicy;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

// Keeps the TTL inside chrono's representable range.
const MAX_STAGING_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

// Serializable
// Explicit defaults for every key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// Extra classify attempts after a transient failure. Commits are never
    /// retried automatically.
    pub classify_retries: u32,
    pub staging_ttl_secs: u64,
    pub validation: ValidationPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 30_000,
            classify_retries: 1,
            staging_ttl_secs: 24 * 60 * 60,
            validation: ValidationPolicy::default(),
        }
    }
}

impl IngestConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: IngestConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".into()));
        }
        if self.validation.max_file_size == 0 {
            return Err(ConfigError::Invalid("validation.max_file_size must be positive".into()));
        }
        if self.validation.allowed_kinds.is_empty() {
            return Err(ConfigError::Invalid("validation.allowed_kinds must not be empty".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn staging_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.staging_ttl_secs.min(MAX_STAGING_TTL_SECS) as i64)
    }
}
