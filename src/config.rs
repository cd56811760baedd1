//! Client configuration
//!
//! Defaults match the analysis service's local development setup. A handful
//! of environment variables override them, and the CLI layers its own flags
//! on top.

use std::path::PathBuf;
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::api::RetryPolicy;
use crate::cache::{default_cache_dir, DEFAULT_TTL_SECS};

/// Service root used when nothing else is configured
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api/v1";

/// Per-request deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overrides the service root
pub const ENV_API_BASE: &str = "STOCKCHAT_API_BASE";
/// Overrides the cache directory
pub const ENV_CACHE_DIR: &str = "STOCKCHAT_CACHE_DIR";
/// Overrides the per-request timeout, in whole seconds
pub const ENV_TIMEOUT_SECS: &str = "STOCKCHAT_TIMEOUT_SECS";

/// Errors from reading configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set to something unusable
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

/// Settings for a `StockClient`
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Service root, e.g. `http://localhost:8000/api/v1`
    pub api_base: String,
    /// Per-request deadline
    pub timeout: Duration,
    /// Attempts and backoff for transient failures
    pub retry: RetryPolicy,
    /// How long a successful read stays cached
    pub cache_ttl: Duration,
    /// Root directory for persisted cache entries; `None` keeps the cache in
    /// memory only
    pub cache_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,                                // 10 seconds
            retry: RetryPolicy::default(),                           // 3 attempts, 1s/2s
            cache_ttl: Duration::from_secs(DEFAULT_TTL_SECS as u64), // 5 minutes
            cache_dir: default_cache_dir(),
        }
    }
}

impl ClientConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up through `lookup`
    ///
    /// Split out from `from_env` so it can be exercised without touching the
    /// process environment.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup(ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
            self.api_base = base.trim().to_string();
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.trim().is_empty()) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    name: ENV_TIMEOUT_SECS,
                    value: raw.clone(),
                })?;
            self.timeout = Duration::from_secs(secs);
        }
        Ok(self)
    }

    /// Sets the service root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Sets the per-request deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the cache freshness window
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets (or with `None`, disables) the persisted cache directory
    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache_dir = dir;
        self
    }

    /// Directory this configuration's cache entries live in
    ///
    /// Entries are namespaced per service root so pointing the client at a
    /// different server never serves the other server's responses.
    pub fn cache_namespace_dir(&self) -> Option<PathBuf> {
        let root = self.cache_dir.as_ref()?;
        let mut hasher = Sha256::new();
        hasher.update(self.api_base.trim_end_matches('/').as_bytes());
        let digest = hasher.finalize();
        Some(root.join(hex::encode(&digest[..8])))
    }
}
