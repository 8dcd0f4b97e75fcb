//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call to a dependency:
//!     → timeouts.rs (optional per-call deadline)
//!     → retries.rs (retry with backoff.rs delays, paced by clock.rs)
//!     → circuit_breaker.rs (one breaker per dependency, looked up in registry.rs)
//!     → degradation.rs (fallback value when classify.rs says the error is transient)
//! ```
//!
//! # Design Decisions
//! - Retries sit inside the breaker: one breaker failure per exhausted retry run
//! - Breaker state is evaluated lazily on each call; there is no background timer
//! - Errors are never wrapped beyond the typed `BreakerError` / `TimeoutError` variants

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
pub mod clock;
pub mod degradation;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerError, BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use classify::{classify, is_transient_error, ErrorKind, ErrorSignals, UpstreamError};
pub use clock::{Clock, TokioClock};
// Testing aid for callers that need deterministic time.
pub use clock::ManualClock;
pub use degradation::{with_graceful_degradation, with_graceful_degradation_by};
pub use registry::CircuitBreakerRegistry;
pub use retries::{with_retry, Retry, RetryConfig};
pub use timeouts::{with_timeout, TimeoutError};
