//! Configuration validation rules.
//!
//! This module provides validation logic for `FetcherConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{CacheBackend, FetcherConfig};
use thiserror::Error;

/// Longest accepted cache freshness window.
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl FetcherConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `pool_size` is 0
    /// - `timeout_secs` exceeds 5 minutes
    /// - `cache_ttl_secs` is 0 or longer than a year
    /// - `user_agent` is empty
    /// - `render_program` is set but empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid { field: "pool_size".into(), reason: "must be greater than 0".into() });
        }

        if self.timeout_secs > 300 {
            return Err(ConfigError::Invalid {
                field: "timeout_secs".into(),
                reason: "must not exceed 5 minutes (300s)".into(),
            });
        }

        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_ttl_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::Invalid {
                field: "cache_ttl_secs".into(),
                reason: format!("must not exceed one year ({MAX_CACHE_TTL_SECS}s)"),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if let Some(program) = &self.render_program
            && program.trim().is_empty()
        {
            return Err(ConfigError::Invalid { field: "render_program".into(), reason: "must not be empty".into() });
        }

        if self.cache_backend != CacheBackend::None && self.cache_key_prefix.is_empty() {
            tracing::warn!(
                backend = ?self.cache_backend,
                "cache_key_prefix is empty; fingerprints may collide with other users of the same cache"
            );
        }

        Ok(())
    }
}
