//! Per-dependency circuit breakers.
//!
//! One breaker per external service ("payments", "database", "llm"), owned by
//! the composition root and handed to whoever needs it.

use std::sync::Arc;

use dashmap::DashMap;

use crate::resilience::circuit_breaker::{BreakerStatus, CircuitBreaker, CircuitBreakerConfig};
use crate::resilience::clock::{Clock, TokioClock};

/// Registry of named circuit breakers.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
            clock: Arc::new(TokioClock),
        }
    }

    /// Clock handed to every breaker created from now on.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create (or replace) the breaker for `name`.
    pub fn register(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let breaker = Arc::new(CircuitBreaker::new(name, config).with_clock(self.clock.clone()));
        if self
            .breakers
            .insert(name.to_string(), breaker.clone())
            .is_some()
        {
            tracing::info!(circuit_breaker = %name, "Replaced circuit breaker");
        } else {
            tracing::debug!(circuit_breaker = %name, "Registered circuit breaker");
        }
        breaker
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    /// Fetch the breaker for `name`, creating it with the default config on first use.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(circuit_breaker = %name, "Created circuit breaker with defaults");
                Arc::new(
                    CircuitBreaker::new(name, self.default_config.clone())
                        .with_clock(self.clock.clone()),
                )
            })
            .value()
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Status of every breaker, sorted by name.
    pub fn statuses(&self) -> Vec<BreakerStatus> {
        let mut statuses: Vec<BreakerStatus> =
            self.breakers.iter().map(|entry| entry.value().status()).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;
    use crate::resilience::classify::UpstreamError;
    use std::time::Duration;

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let registry = CircuitBreakerRegistry::default();
        let first = registry.get_or_create("payments");
        let second = registry.get_or_create("payments");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.config().failure_threshold, 5);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_uses_given_config() {
        let registry = CircuitBreakerRegistry::default();
        registry.register(
            "llm",
            CircuitBreakerConfig {
                failure_threshold: 2,
                recovery_timeout: Duration::from_secs(5),
                ..CircuitBreakerConfig::default()
            },
        );
        let llm = registry.get("llm").unwrap();
        assert_eq!(llm.config().failure_threshold, 2);
        assert!(registry.get("database").is_none());
    }

    #[tokio::test]
    async fn test_breakers_are_independent() {
        let registry = CircuitBreakerRegistry::default();
        registry.register(
            "payments",
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..CircuitBreakerConfig::default()
            },
        );
        let payments = registry.get_or_create("payments");
        let database = registry.get_or_create("database");

        let _ = payments
            .execute(|| async { Err::<(), _>(UpstreamError::new("card network down")) })
            .await;

        assert_eq!(payments.state(), CircuitState::Open);
        assert_eq!(database.state(), CircuitState::Closed);

        let statuses = registry.statuses();
        let names: Vec<&str> = statuses.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["database", "payments"]);
        assert_eq!(registry.names(), vec!["database", "payments"]);
    }
}
