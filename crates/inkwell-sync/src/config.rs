//! # Sync Engine Configuration
//!
//! Loads `SyncEngineConfig` from a TOML file, then applies environment
//! variable overrides, then validates. Mirrors the three-tier precedence
//! (defaults → file → env) used by this engine's upstream counterpart.
//!
//! ## Usage
//! ```rust,ignore
//! let config = SyncEngineConfig::load_or_default(None)?;
//! let client = reqwest::Client::builder()
//!     .timeout(config.request_timeout())
//!     .build()?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

fn default_base_url() -> String {
    "https://api.example.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    inkwell_core::DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    inkwell_core::MAX_RETRIES
}

fn default_backoff_base_ms() -> u64 {
    inkwell_core::BACKOFF_BASE_MS
}

fn default_retention_days() -> i64 {
    inkwell_core::RETENTION_DAYS
}

fn default_sweep_days() -> i64 {
    inkwell_core::SWEEP_DAYS
}

fn default_sync_wait_timeout_secs() -> u64 {
    inkwell_core::DEFAULT_SYNC_WAIT_TIMEOUT_SECS
}

fn default_batch_size() -> u32 {
    25
}

/// Sync engine configuration, covering every environment knob named in the
/// external interfaces section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEngineConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    #[serde(default = "default_sweep_days")]
    pub sweep_days: i64,

    #[serde(default = "default_sync_wait_timeout_secs")]
    pub sync_wait_timeout_secs: u64,

    /// Maximum outbox items claimed per engine pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        SyncEngineConfig {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            retention_days: default_retention_days(),
            sweep_days: default_sweep_days(),
            sync_wait_timeout_secs: default_sync_wait_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

impl SyncEngineConfig {
    /// Loads configuration from `path` if it exists, applies environment
    /// variable overrides, then validates.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            SyncEngineConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads from the default config path, falling back to defaults (with
    /// env overrides applied) if no file exists there.
    pub fn load_or_default() -> SyncResult<Self> {
        match Self::default_config_path() {
            Some(path) => Self::load(&path),
            None => {
                let mut config = SyncEngineConfig::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn save(&self, path: &Path) -> SyncResult<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "inkwell", "reading-journal")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("INKWELL_BASE_URL") {
            self.base_url = val;
        }
        if let Ok(val) = std::env::var("INKWELL_REQUEST_TIMEOUT_SECS") {
            if let Ok(parsed) = val.parse() {
                self.request_timeout_secs = parsed;
            }
        }
        if let Ok(val) = std::env::var("INKWELL_MAX_RETRIES") {
            if let Ok(parsed) = val.parse() {
                self.max_retries = parsed;
            }
        }
        if let Ok(val) = std::env::var("INKWELL_BACKOFF_BASE_MS") {
            if let Ok(parsed) = val.parse() {
                self.backoff_base_ms = parsed;
            }
        }
        if let Ok(val) = std::env::var("INKWELL_RETENTION_DAYS") {
            if let Ok(parsed) = val.parse() {
                self.retention_days = parsed;
            }
        }
        if let Ok(val) = std::env::var("INKWELL_SWEEP_DAYS") {
            if let Ok(parsed) = val.parse() {
                self.sweep_days = parsed;
            }
        }
        if let Ok(val) = std::env::var("INKWELL_SYNC_WAIT_TIMEOUT_SECS") {
            if let Ok(parsed) = val.parse() {
                self.sync_wait_timeout_secs = parsed;
            }
        }
    }

    fn validate(&self) -> SyncResult<()> {
        url::Url::parse(&self.base_url).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;

        if self.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(SyncError::InvalidConfig(
                "max_retries must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sync_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_wait_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}
