//! Type-Safe Configuration with Validation
//!
//! Provides type-safe configuration with URL validation and environment variable support.

use rust_common::{HttpConfig, RetryConfig, TracingConfig};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl { field: String, reason: String },

    /// Invalid TTL value
    #[error("Invalid TTL: must be greater than 0")]
    InvalidTtl,

    /// Invalid path prefix
    #[error("Invalid API path prefix {0:?}: must start with '/'")]
    InvalidPathPrefix(String),

    /// Diagnostic margin does not fit inside the runtime deadline
    #[error("Diagnostic margin must be shorter than the runtime timeout")]
    InvalidDiagnosticMargin,

    /// Unknown trigger mode
    #[error("Unknown trigger mode {0:?}: expected 'edge' or 'gateway'")]
    InvalidTriggerMode(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError { name: String, reason: String },
}

/// Which inbound event shape the process is deployed behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// CDN edge trigger (records array, base64 bodies, string status)
    Edge,
    /// Standard API gateway proxy and request-authorizer events
    Gateway,
}

impl FromStr for TriggerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "edge" | "cdn" => Ok(Self::Edge),
            "gateway" | "api" => Ok(Self::Gateway),
            other => Err(ConfigError::InvalidTriggerMode(other.to_string())),
        }
    }
}

/// Service configuration with validation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Inbound event variant handled by the binary
    pub trigger_mode: TriggerMode,
    /// Prefix distinguishing API traffic on the CDN (stripped from paths)
    pub api_path_prefix: String,
    /// Lifetime of a resolved verification key in seconds (must be > 0)
    pub key_cache_ttl_seconds: u64,
    /// Retry budget for discovery and key-set fetches
    pub key_fetch_max_retries: u32,
    /// Per-request timeout for issuer calls in seconds (must be > 0)
    pub key_fetch_timeout_secs: u64,
    /// Hard deadline imposed by the invoking runtime in seconds
    pub runtime_timeout_secs: u64,
    /// How long before the deadline the diagnostic request log fires
    pub diagnostic_margin_secs: u64,
    /// Token endpoint used to exchange opaque credentials, if any
    pub credential_exchange_url: Option<Url>,
    /// Issuers whose tokens are accepted; empty accepts any issuer
    pub allowed_issuers: Vec<String>,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// JSON log output
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trigger_mode: TriggerMode::Edge,
            api_path_prefix: "/api".to_string(),
            key_cache_ttl_seconds: 3600,
            key_fetch_max_retries: 4,
            key_fetch_timeout_secs: 10,
            runtime_timeout_secs: 60,
            diagnostic_margin_secs: 5,
            credential_exchange_url: None,
            allowed_issuers: Vec::new(),
            log_level: "info".to_string(),
            log_json: true,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables with validation.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a variable fails to parse or the
    /// resulting configuration is inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            trigger_mode: parse_env("TRIGGER_MODE", defaults.trigger_mode)?,
            api_path_prefix: env::var("API_PATH_PREFIX").unwrap_or(defaults.api_path_prefix),
            key_cache_ttl_seconds: parse_env("KEY_CACHE_TTL", defaults.key_cache_ttl_seconds)?,
            key_fetch_max_retries: parse_env(
                "KEY_FETCH_MAX_RETRIES",
                defaults.key_fetch_max_retries,
            )?,
            key_fetch_timeout_secs: parse_env("KEY_FETCH_TIMEOUT", defaults.key_fetch_timeout_secs)?,
            runtime_timeout_secs: parse_env("RUNTIME_TIMEOUT", defaults.runtime_timeout_secs)?,
            diagnostic_margin_secs: parse_env("DIAGNOSTIC_MARGIN", defaults.diagnostic_margin_secs)?,
            credential_exchange_url: parse_optional_url_env("CREDENTIAL_EXCHANGE_URL")?,
            allowed_issuers: parse_list_env("ALLOWED_ISSUERS"),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json: parse_env("LOG_JSON", defaults.log_json)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_cache_ttl_seconds == 0 {
            return Err(ConfigError::InvalidTtl);
        }
        if !self.api_path_prefix.starts_with('/') {
            return Err(ConfigError::InvalidPathPrefix(self.api_path_prefix.clone()));
        }
        if self.key_fetch_timeout_secs == 0 {
            return Err(ConfigError::ParseError {
                name: "KEY_FETCH_TIMEOUT".to_string(),
                reason: "timeout must be greater than 0".to_string(),
            });
        }
        if self.diagnostic_margin_secs >= self.runtime_timeout_secs {
            return Err(ConfigError::InvalidDiagnosticMargin);
        }
        Ok(())
    }

    /// Key cache entry lifetime.
    #[must_use]
    pub const fn key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.key_cache_ttl_seconds)
    }

    /// Delay after which a still-running invocation logs its request.
    #[must_use]
    pub const fn diagnostic_delay(&self) -> Duration {
        Duration::from_secs(self.runtime_timeout_secs.saturating_sub(self.diagnostic_margin_secs))
    }

    /// HTTP client settings for issuer calls.
    #[must_use]
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig::default().with_timeout(Duration::from_secs(self.key_fetch_timeout_secs))
    }

    /// Retry settings for issuer calls.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default().with_max_retries(self.key_fetch_max_retries)
    }

    /// Tracing subscriber settings.
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig::default()
            .with_log_level(&self.log_level)
            .with_json_output(self.log_json)
    }
}

/// Parse an environment variable with a default value.
fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse an optional URL environment variable; empty counts as unset.
fn parse_optional_url_env(name: &str) -> Result<Option<Url>, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => parse_url(name, raw.trim()).map(Some),
        _ => Ok(None),
    }
}

/// Parse a comma-separated list; blank entries are dropped.
fn parse_list_env(name: &str) -> Vec<String> {
    env::var(name)
        .map(|raw| split_list(&raw))
        .unwrap_or_default()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        reason: e.to_string(),
    })
}
