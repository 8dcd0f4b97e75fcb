//! Retry logic.
//!
//! # Responsibilities
//! - Run an operation up to `max_attempts` times
//! - Sleep with exponential backoff + jitter between attempts
//! - Hand back the final attempt's error untouched
//!
//! The operation must be safe to repeat; the executor does no deduplication.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::clock::{Clock, TokioClock};

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,
    /// Scale each delay by a random factor in `[0.5, 1.0]`.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = backoff_multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Retry executor.
pub struct Retry<E> {
    config: RetryConfig,
    clock: Arc<dyn Clock>,
    should_retry: Option<RetryPredicate<E>>,
}

impl<E> Clone for Retry<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            clock: self.clock.clone(),
            should_retry: self.should_retry.clone(),
        }
    }
}

impl<E> std::fmt::Debug for Retry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retry")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("should_retry", &self.should_retry.is_some())
            .finish()
    }
}

impl<E> Retry<E> {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            clock: Arc::new(TokioClock),
            should_retry: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Only retry errors accepted by `predicate`; anything else is returned at once.
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds or the attempts run out.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= max_attempts {
                tracing::warn!(attempts = attempt, error = %err, "Retry attempts exhausted");
                metrics::record_retry_exhausted();
                return Err(err);
            }

            if let Some(should_retry) = &self.should_retry {
                if !should_retry(&err) {
                    tracing::debug!(attempt, error = %err, "Error is not retryable");
                    return Err(err);
                }
            }

            let delay = calculate_backoff(attempt, &self.config);
            tracing::debug!(attempt, delay = ?delay, error = %err, "Attempt failed, retrying");
            metrics::record_retry_attempt();

            self.clock.sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Run `operation` with `config` on the tokio clock.
pub async fn with_retry<T, E, F, Fut>(operation: F, config: RetryConfig) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    Retry::new(config).execute(operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::classify::{is_transient_error, UpstreamError};
    use crate::resilience::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn retry(config: RetryConfig) -> (Retry<UpstreamError>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (Retry::new(config).with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let (retry, _) = retry(RetryConfig::default());
        let calls = AtomicU32::new(0);

        let result = retry
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(UpstreamError::new(format!("network blip {n}")))
                } else {
                    Ok("dinner")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "dinner");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let (retry, clock) = retry(RetryConfig::default().with_jitter(false));
        let calls = AtomicU32::new(0);

        let err = retry
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err::<(), _>(UpstreamError::new(format!("failure {n}")))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.to_string(), "failure 3");
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_first_success_makes_single_call() {
        let (retry, clock) = retry(RetryConfig::default());
        let calls = AtomicU32::new(0);

        let value = retry
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, UpstreamError>(7)
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_jittered_delays_stay_in_range() {
        let (retry, clock) = retry(RetryConfig::default().with_max_attempts(4));

        let _ = retry
            .execute(|| async { Err::<(), _>(UpstreamError::new("timeout")) })
            .await;

        let sleeps = clock.sleeps();
        assert_eq!(sleeps.len(), 3);
        for (i, delay) in sleeps.iter().enumerate() {
            let full = Duration::from_secs(1 << i);
            assert!(*delay >= full / 2 && *delay <= full, "{delay:?}");
        }
    }

    #[tokio::test]
    async fn test_predicate_stops_on_permanent_error() {
        let (retry, clock) = retry(RetryConfig::default());
        let retry = retry.retry_if(|e| is_transient_error(Some(e)));
        let calls = AtomicU32::new(0);

        let err = retry
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(UpstreamError::new("invalid recipe payload").with_status(422))
            })
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(422));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let (retry, _) = retry(RetryConfig::default().with_max_attempts(0));
        let calls = AtomicU32::new(0);

        let _ = retry
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(UpstreamError::new("boom"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_yields_on_tokio_clock() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::default()
            .with_max_attempts(2)
            .with_base_delay(Duration::from_millis(10));

        let started = tokio::time::Instant::now();
        let result = with_retry(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(UpstreamError::new("connection reset"))
                } else {
                    Ok(())
                }
            },
            config,
        )
        .await;

        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(5));
    }
}
