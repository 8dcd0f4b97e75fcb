//! Graceful degradation: substitute a fallback value for transient failures.
//!
//! Permanent errors are never masked; they propagate unchanged.

use std::future::Future;

use crate::observability::metrics;
use crate::resilience::classify::{is_transient_error, ErrorSignals};

/// Run `operation`; on a transient error return `fallback()` instead.
pub async fn with_graceful_degradation<T, E, Op, OpFut, Fb, FbFut>(
    operation: Op,
    fallback: Fb,
) -> Result<T, E>
where
    Op: FnOnce() -> OpFut,
    OpFut: Future<Output = Result<T, E>>,
    Fb: FnOnce() -> FbFut,
    FbFut: Future<Output = T>,
    E: ErrorSignals,
{
    with_graceful_degradation_by(operation, fallback, |err: &E| is_transient_error(Some(err))).await
}

/// Like [`with_graceful_degradation`] with a caller-supplied transient predicate.
pub async fn with_graceful_degradation_by<T, E, Op, OpFut, Fb, FbFut, P>(
    operation: Op,
    fallback: Fb,
    is_transient: P,
) -> Result<T, E>
where
    Op: FnOnce() -> OpFut,
    OpFut: Future<Output = Result<T, E>>,
    Fb: FnOnce() -> FbFut,
    FbFut: Future<Output = T>,
    P: FnOnce(&E) -> bool,
    E: std::fmt::Display,
{
    let err = match operation().await {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    if !is_transient(&err) {
        return Err(err);
    }

    tracing::warn!(error = %err, "Transient failure, serving fallback");
    metrics::record_fallback();
    Ok(fallback().await)
}
