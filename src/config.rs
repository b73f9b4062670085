use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;
use crate::utils::{CircuitBreakerConfig, RetryConfig};

// ============================================================================
// Application Configuration
// ============================================================================
//
// Defaults are usable as-is; `from_env` overrides individual values from
// STOREFRONT_* variables. A malformed value is a validation error naming the
// variable rather than a silent fallback.
//
// ============================================================================

pub const ENV_ORDER_MAX_ATTEMPTS: &str = "STOREFRONT_ORDER_MAX_ATTEMPTS";
pub const ENV_ORDER_RETRY_DELAY_MS: &str = "STOREFRONT_ORDER_RETRY_DELAY_MS";
pub const ENV_OUTBOX_BATCH_SIZE: &str = "STOREFRONT_OUTBOX_BATCH_SIZE";
pub const ENV_OUTBOX_FAILURE_THRESHOLD: &str = "STOREFRONT_OUTBOX_FAILURE_THRESHOLD";

const DEFAULT_LOG_FILTER: &str = "info,storefront_core=debug";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    /// Messages taken per dispatch round
    pub batch_size: usize,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub placement: PlacementConfig,
    pub outbox: OutboxConfig,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            placement: PlacementConfig::default(),
            outbox: OutboxConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(attempts) = parse_var::<u32, _>(&lookup, ENV_ORDER_MAX_ATTEMPTS)? {
            if attempts == 0 {
                return Err(AppError::validation(ENV_ORDER_MAX_ATTEMPTS, "must be at least 1"));
            }
            config.placement.retry.max_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_ORDER_RETRY_DELAY_MS)? {
            config.placement.retry.initial_delay = Duration::from_millis(ms);
        }
        if let Some(size) = parse_var::<usize, _>(&lookup, ENV_OUTBOX_BATCH_SIZE)? {
            if size == 0 {
                return Err(AppError::validation(ENV_OUTBOX_BATCH_SIZE, "must be at least 1"));
            }
            config.outbox.batch_size = size;
        }
        if let Some(threshold) = parse_var::<u32, _>(&lookup, ENV_OUTBOX_FAILURE_THRESHOLD)? {
            config.outbox.circuit_breaker.failure_threshold = threshold.max(1);
        }
        if let Some(filter) = lookup("RUST_LOG") {
            config.log_filter = filter;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::validation(key, format!("invalid value {:?}", raw))),
    }
}
