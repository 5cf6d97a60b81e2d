use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::ConfigError;
use crate::query::PageLimits;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    pub upstream_base_url: String,
    /// Number of messages requested per upstream page.
    pub page_size: usize,
    pub request_timeout_secs: u64,
    pub refresh_interval_secs: u64,
    pub cache_ttl_secs: u64,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Whether a fresh snapshot holding zero messages counts as a valid cache.
    pub serve_empty_snapshot: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: "https://november7-730026606190.europe-west1.run.app".into(),
            page_size: 100,
            request_timeout_secs: 30,
            refresh_interval_secs: 60,
            cache_ttl_secs: 300,
            default_page_size: 20,
            max_page_size: 100,
            serve_empty_snapshot: true,
        }
    }
}

impl ProxyConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }

    /// Default location: `<config dir>/msgsearch/config.json`.
    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("msgsearch").join("config.json"))
    }

    /// Loads the config from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::config_file_path() {
            Some(path) => Self::from_file(path),
            None => {
                warn!("no config directory available, using default config");
                Self::default()
            }
        }
    }

    /// Reads and validates a config file. Any failure falls back to defaults with a warning.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_from_file(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, path = %path.display(), "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    pub fn try_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        let config: ProxyConfig = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.upstream_base_url)
            .map_err(|err| ConfigError::Invalid(format!("upstream_base_url: {err}")))?;
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".into()));
        }
        if self.refresh_interval_secs == 0 || self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_secs and cache_ttl_secs must be positive".into(),
            ));
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::Invalid("max_page_size must be positive".into()));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "default_page_size must be within 1..={}",
                self.max_page_size
            )));
        }
        if self.cache_ttl_secs <= self.refresh_interval_secs {
            warn!(
                ttl = self.cache_ttl_secs,
                interval = self.refresh_interval_secs,
                "cache ttl does not exceed refresh interval; a slow refresh will expire the cache"
            );
        }
        Ok(())
    }
}
