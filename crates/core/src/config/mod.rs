//! Fetcher configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FANOUT_*)
//! 2. TOML config file (if FANOUT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::{CacheGateway, MemoryCache, SqliteCache};

mod validation;

pub use validation::{ConfigError, MAX_CACHE_TTL_SECS};

/// Which cache backend [`FetcherConfig::open_cache`] should build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// No look-aside cache.
    #[default]
    None,
    /// Process-local in-memory cache.
    Memory,
    /// SQLite file at `cache_db_path`.
    Sqlite,
}

/// Batch fetch configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (FANOUT_*)
/// 2. TOML config file (if FANOUT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Per-target deadline in seconds. Zero makes every fetch time out.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of fetches in flight when no shared pool is supplied.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Headers merged into every direct request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Re-interpret every payload of the target-keyed flow as JSON.
    #[serde(default)]
    pub treat_results_as_json: bool,

    /// Sentinel payload substituted for any failed fetch.
    #[serde(default)]
    pub default_value: String,

    /// Drop entries with an empty payload from the target-keyed result.
    #[serde(default = "default_true")]
    pub filter_out_empty_responses: bool,

    /// Namespace mixed into every cache fingerprint.
    #[serde(default = "default_cache_key_prefix")]
    pub cache_key_prefix: String,

    /// Freshness window for cached payloads, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// User-Agent sent by direct requests that carry no identity.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of redirects a direct request follows.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// External page-rendering program used for tier 1 of rendered fetches.
    ///
    /// The program is invoked as `render_program render_args... <url> <identity>`
    /// and must print the rendered document to stdout.
    #[serde(default)]
    pub render_program: Option<String>,

    /// Leading arguments for `render_program` (e.g. a script path).
    #[serde(default)]
    pub render_args: Vec<String>,

    /// Cache backend built by [`FetcherConfig::open_cache`].
    #[serde(default)]
    pub cache_backend: CacheBackend,

    /// Path to the SQLite cache database.
    #[serde(default = "default_cache_db_path")]
    pub cache_db_path: PathBuf,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_pool_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_cache_key_prefix() -> String {
    "fanout".into()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_user_agent() -> String {
    "fanout/0.1".into()
}

fn default_max_redirects() -> usize {
    5
}

fn default_cache_db_path() -> PathBuf {
    PathBuf::from("./fanout-cache.sqlite")
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            pool_size: default_pool_size(),
            headers: BTreeMap::new(),
            treat_results_as_json: false,
            default_value: String::new(),
            filter_out_empty_responses: true,
            cache_key_prefix: default_cache_key_prefix(),
            cache_ttl_secs: default_cache_ttl_secs(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
            render_program: None,
            render_args: Vec::new(),
            cache_backend: CacheBackend::None,
            cache_db_path: default_cache_db_path(),
        }
    }
}

impl FetcherConfig {
    /// Per-target deadline as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Cache freshness window as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `FANOUT_`
    /// 2. TOML file from `FANOUT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// The layered figment used by [`FetcherConfig::load`].
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("FANOUT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("FANOUT_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// Extract and validate a configuration from an arbitrary figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Build the cache backend selected by `cache_backend`.
    ///
    /// Returns `None` for [`CacheBackend::None`], so the batch runs without
    /// a look-aside cache.
    pub async fn open_cache(&self) -> Result<Option<Arc<dyn CacheGateway>>, Error> {
        match self.cache_backend {
            CacheBackend::None => Ok(None),
            CacheBackend::Memory => Ok(Some(Arc::new(MemoryCache::new()))),
            CacheBackend::Sqlite => {
                let cache = SqliteCache::open(&self.cache_db_path).await?;
                Ok(Some(Arc::new(cache)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.pool_size, 1000);
        assert!(config.headers.is_empty());
        assert!(!config.treat_results_as_json);
        assert_eq!(config.default_value, "");
        assert!(config.filter_out_empty_responses);
        assert_eq!(config.cache_key_prefix, "fanout");
        assert_eq!(config.cache_ttl_secs, 300);
        assert_eq!(config.user_agent, "fanout/0.1");
        assert_eq!(config.max_redirects, 5);
        assert!(config.render_program.is_none());
        assert_eq!(config.cache_backend, CacheBackend::None);
    }

    #[test]
    fn test_durations() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(15));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_load_layers_env_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "fanout.toml",
                r#"
                    pool_size = 8
                    timeout_secs = 3
                    cache_backend = "memory"

                    [headers]
                    Accept = "application/json"
                "#,
            )?;
            jail.set_env("FANOUT_CONFIG_FILE", "fanout.toml");
            jail.set_env("FANOUT_TIMEOUT_SECS", "7");

            let config = FetcherConfig::load().expect("config should load");
            assert_eq!(config.pool_size, 8);
            assert_eq!(config.timeout_secs, 7);
            assert_eq!(config.cache_backend, CacheBackend::Memory);
            assert_eq!(config.headers.get("Accept").map(String::as_str), Some("application/json"));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FANOUT_POOL_SIZE", "0");
            let result = FetcherConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "pool_size"));
            Ok(())
        });
    }

    #[tokio::test]
    async fn test_open_cache_none() {
        let config = FetcherConfig::default();
        assert!(config.open_cache().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_cache_memory() {
        let config = FetcherConfig { cache_backend: CacheBackend::Memory, ..Default::default() };
        assert!(config.open_cache().await.unwrap().is_some());
    }
}
