//! Timeout enforcement.
//!
//! Bounds the latency of a single call. Kept separate from the circuit
//! breaker; compose it inside a retry or breaker call when needed.

use std::future::Future;
use std::time::Duration;

use crate::resilience::classify::ErrorSignals;

/// Error from [`with_timeout`].
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E> {
    /// The deadline passed before the operation finished.
    #[error("operation timeout after {0:?}")]
    Elapsed(Duration),
    #[error(transparent)]
    Inner(E),
}

impl<E> TimeoutError<E> {
    pub fn is_elapsed(&self) -> bool {
        matches!(self, TimeoutError::Elapsed(_))
    }
}

impl<E: ErrorSignals> ErrorSignals for TimeoutError<E> {
    fn status_code(&self) -> Option<u16> {
        match self {
            TimeoutError::Elapsed(_) => None,
            TimeoutError::Inner(err) => err.status_code(),
        }
    }

    fn database_code(&self) -> Option<&str> {
        match self {
            TimeoutError::Elapsed(_) => None,
            TimeoutError::Inner(err) => err.database_code(),
        }
    }

    fn is_circuit_open(&self) -> bool {
        match self {
            TimeoutError::Elapsed(_) => false,
            TimeoutError::Inner(err) => err.is_circuit_open(),
        }
    }

    fn is_timeout(&self) -> bool {
        match self {
            TimeoutError::Elapsed(_) => true,
            TimeoutError::Inner(err) => err.is_timeout(),
        }
    }
}

/// Run `operation`, giving up after `limit`. The operation is dropped on timeout.
pub async fn with_timeout<T, E, F, Fut>(limit: Duration, operation: F) -> Result<T, TimeoutError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, operation()).await {
        Ok(result) => result.map_err(TimeoutError::Inner),
        Err(_) => {
            tracing::warn!(timeout = ?limit, "Operation timed out");
            Err(TimeoutError::Elapsed(limit))
        }
    }
}
