//! Lookup adapter configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::retry::RetryPolicy;

/// Configuration for lookups against the classification service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Timeout for a single request (milliseconds).
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Total attempts per request, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Minimum spacing between requests (milliseconds). 0 disables throttling.
    #[serde(default = "default_rate_limit_interval")]
    pub rate_limit_interval_ms: u64,

    /// Requests allowed back-to-back before spacing applies.
    #[serde(default = "default_burst")]
    pub rate_limit_burst: u32,

    /// Delay after the first transient failure (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// How many referenced works to fetch details for per lookup.
    #[serde(default = "default_max_work_followups")]
    pub max_work_followups: usize,

    /// Memoize successful responses for the rest of the run.
    #[serde(default = "default_cache_responses")]
    pub cache_responses: bool,
}

fn default_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_max_attempts() -> u32 {
    3
}

fn default_rate_limit_interval() -> u64 {
    1000 // 1 request per second
}

fn default_burst() -> u32 {
    1
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    8000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_work_followups() -> usize {
    5
}

fn default_cache_responses() -> bool {
    true
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
            max_attempts: default_max_attempts(),
            rate_limit_interval_ms: default_rate_limit_interval(),
            rate_limit_burst: default_burst(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            max_work_followups: default_max_work_followups(),
            cache_responses: default_cache_responses(),
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.backoff_multiplier,
        }
    }
}
