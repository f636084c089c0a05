//! Runtime configuration for the audit side channel.

use std::str::FromStr;
use std::time::Duration;

use crate::document_store::AUDIT_LOG;

pub const ENV_QUEUE_CAPACITY: &str = "ARBOLEDA_AUDIT_QUEUE_CAPACITY";
pub const ENV_MAX_RETRIES: &str = "ARBOLEDA_AUDIT_MAX_RETRIES";
pub const ENV_BACKOFF_MS: &str = "ARBOLEDA_AUDIT_BACKOFF_MS";

/// Bounded exponential backoff for transient store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `retry` (1-based), doubling up to `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Audit writer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    /// Events buffered before `record` starts dropping (minimum 1).
    pub queue_capacity: usize,
    pub retry: RetryPolicy,
    /// Target collection.
    pub collection: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            retry: RetryPolicy::default(),
            collection: AUDIT_LOG.to_string(),
        }
    }
}

impl AuditConfig {
    /// Defaults overridden by `ARBOLEDA_AUDIT_*` environment variables.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(capacity) = env_parse::<usize>(ENV_QUEUE_CAPACITY) {
            config = config.with_queue_capacity(capacity);
        }
        if let Some(retries) = env_parse::<u32>(ENV_MAX_RETRIES) {
            config.retry.max_retries = retries;
        }
        if let Some(ms) = env_parse::<u64>(ENV_BACKOFF_MS) {
            config.retry.base_delay = Duration::from_millis(ms);
        }
        config
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable configuration value");
            None
        }
    }
}
