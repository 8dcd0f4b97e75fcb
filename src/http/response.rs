//! Error → HTTP response mapping.
//!
//! # Responsibilities
//! - Map classified failures to status codes
//! - Render a uniform `{error, message}` JSON body
//!
//! # Design Decisions
//! - Open breakers, timeouts and transient upstream errors are 503: the client may retry
//! - Everything else is 500; upstream details stay in the logs, not the body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::resilience::circuit_breaker::BreakerError;
use crate::resilience::classify::{classify, ErrorKind, ErrorSignals};
use crate::resilience::timeouts::TimeoutError;

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::CircuitOpen | ErrorKind::Timeout | ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Permanent => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the response for a failure of the given kind.
pub fn error_response(kind: ErrorKind, message: impl Into<String>) -> Response {
    let status = status_for(kind);
    let body = ErrorBody {
        error: status.canonical_reason().unwrap_or("Error").to_string(),
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

/// Classify `err`, log it, and render the matching response.
pub fn failure_response<E: ErrorSignals + ?Sized>(err: &E) -> Response {
    let kind = classify(err);
    match kind {
        ErrorKind::Permanent => tracing::error!(error = %err, "Request failed"),
        _ => tracing::warn!(error = %err, kind = ?kind, "Dependency unavailable"),
    }

    let message = match kind {
        ErrorKind::CircuitOpen => "Service temporarily unavailable, please retry later",
        ErrorKind::Timeout => "Upstream request timed out",
        ErrorKind::Transient => "Upstream service unavailable, please retry",
        ErrorKind::Permanent => "Internal server error",
    };
    error_response(kind, message)
}

impl<E: ErrorSignals> IntoResponse for BreakerError<E> {
    fn into_response(self) -> Response {
        failure_response(&self)
    }
}

impl<E: ErrorSignals> IntoResponse for TimeoutError<E> {
    fn into_response(self) -> Response {
        failure_response(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::classify::UpstreamError;
    use std::time::Duration;

    async fn body_of(response: Response) -> ErrorBody {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_open_breaker_is_503() {
        let err: BreakerError<UpstreamError> = BreakerError::Open {
            name: "payments".to_string(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_of(response).await;
        assert_eq!(body.error, "Service Unavailable");
        assert!(!body.message.contains("payments"));
    }

    #[test]
    fn test_statuses_by_kind() {
        let transient = BreakerError::Inner(UpstreamError::new("overloaded").with_status(503));
        assert_eq!(transient.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let permanent = BreakerError::Inner(UpstreamError::new("bad input").with_status(422));
        assert_eq!(permanent.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let timeout: TimeoutError<UpstreamError> = TimeoutError::Elapsed(Duration::from_secs(2));
        assert_eq!(timeout.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let body = body_of(error_response(ErrorKind::Permanent, "boom")).await;
        assert_eq!(
            body,
            ErrorBody {
                error: "Internal Server Error".to_string(),
                message: "boom".to_string(),
            }
        );
    }
}
