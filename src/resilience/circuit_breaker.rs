//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: one probe call decides whether to close or reopen
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: recovery_timeout elapsed since the last failure (checked lazily on call)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! The failure counter is only reset by a success. Entering Open or Half-Open
//! leaves it untouched, so a failed probe reopens immediately.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::classify::{self, ErrorKind, ErrorSignals};
use crate::resilience::clock::{Clock, TokioClock};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used for the state gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time after the last failure before a probe is allowed.
    pub recovery_timeout: Duration,
    /// Reserved for windowed failure counting; not read by the state machine.
    pub monitoring_period: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            monitoring_period: Duration::from_secs(60),
        }
    }
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The call was rejected without running the operation.
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },
    /// The operation ran and failed.
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// The operation's own error, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Inner(err) => Some(err),
        }
    }

    pub fn kind(&self) -> ErrorKind
    where
        E: ErrorSignals,
    {
        classify::classify(self)
    }
}

impl<E: ErrorSignals> ErrorSignals for BreakerError<E> {
    fn status_code(&self) -> Option<u16> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Inner(err) => err.status_code(),
        }
    }

    fn database_code(&self) -> Option<&str> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Inner(err) => err.database_code(),
        }
    }

    fn is_circuit_open(&self) -> bool {
        match self {
            BreakerError::Open { .. } => true,
            BreakerError::Inner(err) => err.is_circuit_open(),
        }
    }

    fn is_timeout(&self) -> bool {
        match self {
            BreakerError::Open { .. } => false,
            BreakerError::Inner(err) => err.is_timeout(),
        }
    }
}

/// Point-in-time view of a breaker for health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub monitoring_period_ms: u64,
    pub last_failure_ms_ago: Option<u64>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

/// Three-state circuit breaker guarding a single dependency.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        metrics::record_circuit_state(&name, CircuitState::Closed);
        Self {
            name,
            config,
            clock: Arc::new(TokioClock),
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state as last evaluated. Does not trigger the Open → Half-Open check.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Time since the most recent recorded failure.
    pub fn last_failure_elapsed(&self) -> Option<Duration> {
        let last_failure = self.lock().last_failure?;
        Some(self.clock.now().saturating_duration_since(last_failure))
    }

    pub fn status(&self) -> BreakerStatus {
        let (state, failure_count, last_failure) = {
            let inner = self.lock();
            (inner.state, inner.failure_count, inner.last_failure)
        };
        let now = self.clock.now();

        BreakerStatus {
            name: self.name.clone(),
            state,
            failure_count,
            failure_threshold: self.config.failure_threshold,
            recovery_timeout_ms: self.config.recovery_timeout.as_millis() as u64,
            monitoring_period_ms: self.config.monitoring_period.as_millis() as u64,
            last_failure_ms_ago: last_failure
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
        }
    }

    /// Run `operation` through the breaker.
    ///
    /// Errors from the operation come back as [`BreakerError::Inner`]; a
    /// short-circuited call returns [`BreakerError::Open`] without running it.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _probe = self.acquire::<E>()?;

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(BreakerError::Inner(err))
            }
        }
    }

    /// Force the breaker back to Closed with a zero failure count.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        inner.last_failure = None;
        inner.probe_in_flight = false;
        self.transition(&mut inner, CircuitState::Closed);
        tracing::info!(circuit_breaker = %self.name, "Circuit breaker manually reset");
    }

    /// Decide whether a call may proceed. Returns a guard when the call is the half-open probe.
    fn acquire<E>(&self) -> Result<Option<ProbeGuard<'_>>, BreakerError<E>> {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => Ok(None),
            CircuitState::Open => {
                let recovered = match inner.last_failure {
                    Some(at) => {
                        self.clock.now().saturating_duration_since(at) >= self.config.recovery_timeout
                    }
                    None => true,
                };

                if !recovered {
                    metrics::record_circuit_rejected(&self.name);
                    return Err(self.open_error());
                }

                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.probe_in_flight = true;
                Ok(Some(ProbeGuard { breaker: self }))
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    metrics::record_circuit_rejected(&self.name);
                    return Err(self.open_error());
                }
                inner.probe_in_flight = true;
                Ok(Some(ProbeGuard { breaker: self }))
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed);
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(self.clock.now());

        tracing::debug!(
            circuit_breaker = %self.name,
            failure_count = inner.failure_count,
            failure_threshold = self.config.failure_threshold,
            "Protected call failed"
        );

        if inner.failure_count >= self.config.failure_threshold
            && inner.state != CircuitState::Open
        {
            self.transition(&mut inner, CircuitState::Open);
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;

        match to {
            CircuitState::Open => tracing::warn!(
                circuit_breaker = %self.name,
                from = %from,
                to = %to,
                failure_count = inner.failure_count,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                circuit_breaker = %self.name,
                from = %from,
                to = %to,
                "Circuit breaker state changed"
            ),
        }

        metrics::record_circuit_transition(&self.name, to);
        metrics::record_circuit_state(&self.name, to);
    }

    fn open_error<E>(&self) -> BreakerError<E> {
        tracing::debug!(circuit_breaker = %self.name, "Circuit open, failing fast");
        BreakerError::Open {
            name: self.name.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .field("config", &self.config)
            .finish()
    }
}

/// Releases the half-open probe slot, including when the probe future is dropped.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.breaker.inner.lock() {
            inner.probe_in_flight = false;
        }
    }
}
