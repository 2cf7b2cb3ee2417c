// crates/correlator-server/src/config.rs
// ============================================================================
// Module: Server Configuration
// Description: Bind, storage, and request-limit configuration validation.
// Purpose: Validate operator-supplied server settings before startup.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Server configuration covers the bind address, the store path, the
//! identity configuration path, and request limits (body size, inflight
//! concurrency, fixed-window rate limiting). Validation fails fast at
//! startup; a non-loopback bind is allowed but logged loudly because the
//! deployment is expected to put authentication in front of it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Returns the default maximum request body size.
const fn default_max_body_bytes() -> usize {
    4 * 1024 * 1024
}

/// Returns the default maximum inflight requests.
const fn default_max_inflight() -> usize {
    64
}

/// Returns the default rate limit window in milliseconds.
const fn default_rate_limit_window_ms() -> u64 {
    1_000
}

/// Returns the default maximum requests per rate limit window.
const fn default_rate_limit_max_requests() -> u32 {
    100
}

/// Returns the default maximum distinct rate limit keys.
const fn default_rate_limit_max_entries() -> usize {
    10_000
}

/// Returns the default view-refresh-after-ingest flag.
const fn default_refresh_after_ingest() -> bool {
    true
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration value is invalid.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Rate limit configuration for server requests.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per time window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub max_requests: u32,
    /// Window duration in milliseconds.
    #[serde(default = "default_rate_limit_window_ms")]
    pub window_ms: u64,
    /// Maximum number of distinct rate limit entries.
    #[serde(default = "default_rate_limit_max_entries")]
    pub max_entries: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max_requests(),
            window_ms: default_rate_limit_window_ms(),
            max_entries: default_rate_limit_max_entries(),
        }
    }
}

impl RateLimitConfig {
    /// Validates rate limit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::Invalid("rate_limit.max_requests must be greater than zero".to_string()));
        }
        if self.window_ms == 0 {
            return Err(ConfigError::Invalid("rate_limit.window_ms must be greater than zero".to_string()));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::Invalid("rate_limit.max_entries must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Request limits for the server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerLimitsConfig {
    /// Maximum inflight requests.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
    /// Optional rate limit configuration.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ServerLimitsConfig {
    fn default() -> Self {
        Self {
            max_inflight: default_max_inflight(),
            rate_limit: None,
        }
    }
}

impl ServerLimitsConfig {
    /// Validates request limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_inflight == 0 {
            return Err(ConfigError::Invalid("max_inflight must be greater than zero".to_string()));
        }
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.validate()?;
        }
        Ok(())
    }
}

/// Correlator server configuration.
///
/// # Invariants
/// - `bind` parses as a socket address.
/// - `max_body_bytes` is greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Path to the `SQLite` database file.
    pub db_path: PathBuf,
    /// Optional identity configuration file path.
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Request limits (rate/concurrency).
    #[serde(default)]
    pub limits: ServerLimitsConfig,
    /// Refresh correlation views after every batch with successful events.
    #[serde(default = "default_refresh_after_ingest")]
    pub refresh_after_ingest: bool,
}

impl ServerConfig {
    /// Creates a configuration with defaults for the given database path.
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            bind: default_bind(),
            db_path: db_path.into(),
            config_path: None,
            max_body_bytes: default_max_body_bytes(),
            limits: ServerLimitsConfig::default(),
            refresh_after_ingest: default_refresh_after_ingest(),
        }
    }

    /// Validates the configuration and returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value is out of range or the bind
    /// address does not parse.
    pub fn validate(&self) -> Result<SocketAddr, ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be greater than zero".to_string()));
        }
        self.limits.validate()?;
        let addr: SocketAddr = self
            .bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid bind address: {}", self.bind)))?;
        if !addr.ip().is_loopback() {
            tracing::warn!(
                bind = %addr,
                "binding beyond loopback without built-in auth; front with an authenticating proxy"
            );
        }
        Ok(addr)
    }
}
