//! Configuration for the `larder` binary.
//!
//! [`LarderConfig`] loads from a TOML file, `LARDER_*` environment variables
//! and built-in defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `LARDER_CONFIG` environment variable
//! 3. Platform default: `~/.config/larder/config.toml`
//! 4. Built-in defaults

use confyg::{Confygery, env};
use larder_auth::AuthConfig;
use larder_core::{Error, Result};
use larder_resilience::{BreakerConfig, Limit, RateLimitConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Configuration structs
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LarderConfig {
    /// Log output.
    pub logging: LoggingConfig,
    /// Dispatcher settings.
    pub dispatch: DispatchConfig,
    /// Protocol and transport rate limits.
    pub rate_limit: RateLimitSection,
    /// Circuit breaker defaults.
    pub breaker: BreakerSettings,
    /// Identity resolution.
    pub auth: AuthConfig,
    /// Outbound HTTP client.
    pub http: HttpConfig,
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Handler timeout for tools without their own.
    pub timeout_ms: u64,
}

/// Both rate limiting layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    /// Per caller and operation, checked by the dispatcher.
    pub protocol: LimitSettings,
    /// Per caller across all operations, checked by the gateway.
    pub transport: LimitSettings,
}

/// One rate limiting layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// When false every call is admitted.
    pub enabled: bool,
    /// Calls admitted per window.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Per-operation limits.
    pub overrides: BTreeMap<String, OperationLimit>,
}

/// Limit for a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLimit {
    /// Calls admitted per window.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Failures that trip a breaker.
    pub failure_threshold: u32,
    /// Trailing failure window. Unset means consecutive failures.
    pub failure_window_ms: Option<u64>,
    /// Failure ratio that also trips a breaker.
    pub failure_rate: Option<f64>,
    /// Calls needed before `failure_rate` applies.
    pub minimum_calls: u32,
    /// Cool-down before a probe is admitted.
    pub open_duration_ms: u64,
}

/// Outbound HTTP configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// `User-Agent` header.
    pub user_agent: String,
}

// ============================================================================
// Default implementations
// ============================================================================

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: larder_mcp::DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            protocol: LimitSettings::per_minute(60),
            transport: LimitSettings::per_minute(120),
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window_ms: Some(60_000),
            failure_rate: None,
            minimum_calls: 10,
            open_duration_ms: 30_000,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: format!("larder/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn non_zero_ms(ms: u64, what: &str) -> Result<Duration> {
    if ms == 0 {
        return Err(Error::config(format!("{what} must be greater than zero")));
    }
    Ok(Duration::from_millis(ms))
}

impl DispatchConfig {
    /// Handler timeout as a duration.
    pub fn timeout(&self) -> Result<Duration> {
        non_zero_ms(self.timeout_ms, "dispatch.timeout_ms")
    }
}

impl LimitSettings {
    fn per_minute(max_requests: u32) -> Self {
        Self {
            enabled: true,
            max_requests,
            window_ms: 60_000,
            overrides: BTreeMap::new(),
        }
    }

    /// Build a validated limiter config.
    pub fn to_rate_limit_config(&self) -> Result<RateLimitConfig> {
        if !self.enabled {
            return Ok(RateLimitConfig::disabled());
        }
        let mut config =
            RateLimitConfig::new(self.max_requests, Duration::from_millis(self.window_ms));
        for (operation, limit) in &self.overrides {
            config = config.with_override(
                operation.clone(),
                Limit::new(limit.max_requests, Duration::from_millis(limit.window_ms)),
            );
        }
        config.validate()?;
        Ok(config)
    }
}

impl BreakerSettings {
    /// Build a validated breaker config.
    pub fn to_breaker_config(&self) -> Result<BreakerConfig> {
        if self.failure_threshold == 0 {
            return Err(Error::config("breaker.failure_threshold must be at least 1"));
        }
        let open = non_zero_ms(self.open_duration_ms, "breaker.open_duration_ms")?;
        let config = match self.failure_window_ms {
            Some(ms) => BreakerConfig::windowed(
                self.failure_threshold,
                non_zero_ms(ms, "breaker.failure_window_ms")?,
                open,
            ),
            None => BreakerConfig::consecutive(self.failure_threshold, open),
        };
        match self.failure_rate {
            Some(_) if self.failure_window_ms.is_none() => Err(Error::config(
                "breaker.failure_rate requires breaker.failure_window_ms",
            )),
            Some(rate) if !(0.0..=1.0).contains(&rate) => Err(Error::config(format!(
                "breaker.failure_rate must be between 0 and 1, got {rate}"
            ))),
            Some(rate) => Ok(config.with_failure_rate(rate, self.minimum_calls)),
            None => Ok(config),
        }
    }
}

impl HttpConfig {
    /// Request timeout as a duration.
    pub fn timeout(&self) -> Result<Duration> {
        non_zero_ms(self.timeout_ms, "http.timeout_ms")
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl LarderConfig {
    /// Load configuration from file, environment, and defaults.
    ///
    /// A missing file is not an error; defaults and the environment still
    /// apply. Environment values arrive as strings, so only string fields
    /// (such as `LARDER_LOGGING_LEVEL`) can be overridden that way.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path)
            && path.exists()
        {
            builder
                .add_file(&path.to_string_lossy())
                .map_err(|e| Error::config(format!("config file: {e}")))?;
        }

        let mut env_opts = env::Options::with_top_level("LARDER");
        for section in ENV_SECTIONS {
            env_opts.add_section(*section);
        }
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;

        log::debug!("configuration loaded");
        Ok(config)
    }

    /// Resolve the config file path from explicit flag, env var, or the
    /// platform default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("LARDER_CONFIG") {
            return Some(PathBuf::from(path));
        }
        Self::default_config_path()
    }

    /// Platform default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("larder").join("config.toml"))
    }

    /// Copy of this config with token values masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for grant in &mut config.auth.tokens {
            grant.token = "********".to_string();
        }
        config
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Flatten the settings [`load`](Self::load) reads from the environment
    /// into `LARDER_`-prefixed pairs.
    ///
    /// Only string fields of the overlaid sections are emitted, so every
    /// pair printed can be exported and read back unchanged.
    pub fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let value: toml::Value =
            toml::Value::try_from(self).map_err(|e| Error::config(e.to_string()))?;
        let mut vars = Vec::new();
        if let toml::Value::Table(table) = &value {
            for section in ENV_SECTIONS {
                if let Some(val) = table.get(*section) {
                    flatten_toml_value(val, &env_key("LARDER", section), &mut vars);
                }
            }
        }
        Ok(vars)
    }
}

/// Sections overlaid from `LARDER_*` variables. Each has string fields.
const ENV_SECTIONS: &[&str] = &["logging", "auth", "http"];

fn env_key(prefix: &str, key: &str) -> String {
    format!("{}_{}", prefix, key.to_uppercase().replace(['-', '.'], "_"))
}

/// Recursively flatten the string leaves of a TOML value into `KEY=value`
/// pairs.
fn flatten_toml_value(value: &toml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                flatten_toml_value(val, &env_key(prefix, key), out);
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        // Environment values arrive as strings and would not deserialize
        // back into these.
        _ => {}
    }
}

// ============================================================================
// Tests
// ============================================================================
