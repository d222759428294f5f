//! Engine configuration.
//!
//! Layering, lowest precedence first: built-in defaults, an optional JSON
//! file (partial files are fine), `FLOATSCAN_*` environment variables, then
//! whatever the caller sets directly (CLI flags).

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::BatchConfig;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::http_client::BROWSER_USER_AGENT;
use crate::retry::RetryConfig;
use crate::scoring::ScoringConfig;
use crate::sourcing::SourcingConfig;
use crate::throttling::ThrottlePolicy;
use crate::{ConfigError, HistoryRange};

pub const ENV_CONCURRENCY: &str = "FLOATSCAN_CONCURRENCY";
pub const ENV_TIMEOUT_MS: &str = "FLOATSCAN_TIMEOUT_MS";
pub const ENV_PENNY_CEILING: &str = "FLOATSCAN_PENNY_CEILING";
pub const ENV_HISTORY_RANGE: &str = "FLOATSCAN_HISTORY_RANGE";

/// Outbound HTTP settings shared by the gateway and the candidate feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub throttle: ThrottlePolicy,
    pub breaker_failure_threshold: u32,
    pub breaker_open_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: String::from(BROWSER_USER_AGENT),
            max_retries: 2,
            retry_base_ms: 250,
            throttle: ThrottlePolicy::default(),
            breaker_failure_threshold: 5,
            breaker_open_secs: 30,
        }
    }
}

impl HttpConfig {
    pub fn retry(&self) -> RetryConfig {
        if self.max_retries == 0 {
            RetryConfig::no_retry()
        } else {
            RetryConfig::exponential(self.max_retries, Duration::from_millis(self.retry_base_ms))
        }
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold.max(1),
            open_timeout: Duration::from_secs(self.breaker_open_secs),
        }
    }
}

/// Everything needed to build a [`ScreenerEngine`](crate::ScreenerEngine).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub http: HttpConfig,
    pub sourcing: SourcingConfig,
    pub scoring: ScoringConfig,
    pub batch: BatchConfig,
}

impl EngineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Applies `FLOATSCAN_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    /// Applies overrides from any key lookup; unset keys are left alone.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = parse_override(&lookup, ENV_CONCURRENCY)? {
            self.batch.concurrency = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_TIMEOUT_MS)? {
            self.http.timeout_ms = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_PENNY_CEILING)? {
            self.sourcing.penny_ceiling = value;
        }
        if let Some(value) = parse_override::<HistoryRange, _>(&lookup, ENV_HISTORY_RANGE)? {
            self.scoring.history_range = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.concurrency == 0 {
            return Err(ConfigError::Invalid(String::from(
                "batch.concurrency must be at least 1",
            )));
        }
        if self.http.timeout_ms == 0 {
            return Err(ConfigError::Invalid(String::from(
                "http.timeout_ms must be greater than zero",
            )));
        }
        if !(self.sourcing.penny_ceiling.is_finite() && self.sourcing.penny_ceiling > 0.0) {
            return Err(ConfigError::Invalid(String::from(
                "sourcing.penny_ceiling must be a positive number",
            )));
        }
        if let Some(field) = self.scoring.invalid_field() {
            return Err(ConfigError::Invalid(format!(
                "scoring.{field} must be a finite, non-negative number"
            )));
        }
        Ok(())
    }
}

fn parse_override<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnv { key, value: raw })
}
