//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

const MAX_BYTES_LIMIT: usize = 200 * 1024 * 1024;

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not a bare http(s) origin
    /// - a region name is empty or two region names collide
    /// - `max_bytes` is 0 or exceeds 200MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `prefetch_concurrency` is outside 1..=16
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_origin()?;

        let names = [
            ("cache_name", &self.cache_name),
            ("staging_name", &self.staging_name),
            ("manifest_store_name", &self.manifest_store_name),
        ];
        for (field, name) in names {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not be empty".into() });
            }
        }
        if self.cache_name == self.staging_name
            || self.cache_name == self.manifest_store_name
            || self.staging_name == self.manifest_store_name
        {
            return Err(ConfigError::Invalid {
                field: "cache_name".into(),
                reason: "region names must be distinct".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > MAX_BYTES_LIMIT {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 200MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !(1..=16).contains(&self.prefetch_concurrency) {
            return Err(ConfigError::Invalid {
                field: "prefetch_concurrency".into(),
                reason: "must be between 1 and 16".into(),
            });
        }

        if !self.manifest_path.exists() {
            tracing::warn!(
                manifest_path = %self.manifest_path.display(),
                "manifest file does not exist yet; the worker cannot start until it is generated"
            );
        }

        Ok(())
    }

    fn validate_origin(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid { field: "origin".into(), reason };

        let parsed = url::Url::parse(self.origin.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme: {}", parsed.scheme())));
        }
        if parsed.host_str().is_none() {
            return Err(invalid("missing host".into()));
        }
        if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(invalid("must not contain a path, query or fragment".into()));
        }

        Ok(())
    }
}
