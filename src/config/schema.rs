//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Durations are
//! spelled out in the key (`_ms`, `_secs`) and converted into the runtime
//! resilience types by the `to_*` methods.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::security::{RateLimitPolicy, RateLimitTier};

/// Breakers created when the file names none.
pub const DEFAULT_BREAKERS: [&str; 3] = ["payments", "database", "llm"];

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener.
    pub listener: ListenerConfig,

    /// Retry policy shared by outbound calls.
    pub retry: RetrySettings,

    /// Circuit breakers keyed by dependency name.
    pub breakers: Breakers,

    /// Request rate limiting.
    pub rate_limit: RateLimitSettings,

    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Retry settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Delay after the first failure, in milliseconds.
    pub base_delay_ms: u64,

    /// Cap on a single delay, in milliseconds.
    pub max_delay_ms: u64,

    pub backoff_multiplier: f64,

    /// Randomize delays into `[0.5, 1.0]` of their computed value.
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter: self.jitter,
        }
    }
}

/// Named breaker settings. Defaults to one entry per [`DEFAULT_BREAKERS`] name.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct Breakers(pub BTreeMap<String, BreakerSettings>);

impl Default for Breakers {
    fn default() -> Self {
        Self(
            DEFAULT_BREAKERS
                .iter()
                .map(|name| (name.to_string(), BreakerSettings::default()))
                .collect(),
        )
    }
}

impl Breakers {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BreakerSettings)> {
        self.0.iter()
    }

    pub fn get(&self, name: &str) -> Option<&BreakerSettings> {
        self.0.get(name)
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive failures before opening.
    pub failure_threshold: u32,

    /// Time after the last failure before a probe, in milliseconds.
    pub recovery_timeout_ms: u64,

    /// Accepted and carried through; has no effect on the breaker.
    pub monitoring_period_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            monitoring_period_ms: 60_000,
        }
    }
}

impl BreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_millis(self.recovery_timeout_ms),
            monitoring_period: Duration::from_millis(self.monitoring_period_ms),
        }
    }
}

/// Rate limiting settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Apply the limiter to incoming requests.
    pub enabled: bool,

    /// Seconds between sweeps of expired windows.
    pub sweep_interval_secs: u64,

    /// Tier applied to the HTTP surface; must name an entry of `tiers`.
    pub default_tier: String,

    /// Tier policies keyed by name. Defaults to the five presets.
    pub tiers: BTreeMap<String, TierSettings>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: 300,
            default_tier: RateLimitTier::Standard.name().to_string(),
            tiers: RateLimitTier::ALL
                .iter()
                .map(|tier| (tier.name().to_string(), TierSettings::from(tier.policy())))
                .collect(),
        }
    }
}

impl RateLimitSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Policy of `default_tier`, if the tier exists.
    pub fn default_policy(&self) -> Option<RateLimitPolicy> {
        self.tiers.get(&self.default_tier).map(TierSettings::policy)
    }
}

/// One rate-limit tier.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct TierSettings {
    /// Requests allowed per window.
    pub requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl TierSettings {
    pub fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.requests, Duration::from_secs(self.window_secs))
    }
}

impl From<RateLimitPolicy> for TierSettings {
    fn from(policy: RateLimitPolicy) -> Self {
        Self {
            requests: policy.requests,
            window_secs: policy.window.as_secs(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
