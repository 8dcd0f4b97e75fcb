//! Transient-error classification.
//!
//! Decides whether a failure is worth retrying (or masking with a fallback).
//! Network trouble, timeouts, 5xx, 429 and serialization conflicts are
//! transient; everything else is permanent.

use std::fmt;

use serde::Serialize;

/// Message fragments that mark an error as transient (matched case-insensitively).
const TRANSIENT_MESSAGE_MARKERS: [&str; 5] =
    ["network", "timeout", "connection", "econnreset", "enotfound"];

/// Postgres `serialization_failure`.
pub const SERIALIZATION_FAILURE: &str = "40001";
/// Postgres `deadlock_detected`.
pub const DEADLOCK_DETECTED: &str = "40P01";

/// Structured details an error can expose to the classifier.
pub trait ErrorSignals: fmt::Display {
    /// HTTP status returned by the remote side, if any.
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Database error code (SQLSTATE), if any.
    fn database_code(&self) -> Option<&str> {
        None
    }

    /// Whether this error is a circuit breaker short-circuit.
    fn is_circuit_open(&self) -> bool {
        false
    }

    /// Whether this error is an elapsed deadline.
    fn is_timeout(&self) -> bool {
        false
    }
}

/// Returns true when `error` is expected to clear up on retry.
pub fn is_transient_error<E>(error: Option<&E>) -> bool
where
    E: ErrorSignals + ?Sized,
{
    let Some(error) = error else {
        return false;
    };

    // Checked first: the breaker name in the message may contain a marker.
    if error.is_circuit_open() {
        return false;
    }

    let message = error.to_string().to_lowercase();
    if TRANSIENT_MESSAGE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
    {
        return true;
    }

    if let Some(status) = error.status_code() {
        if status >= 500 || status == 429 {
            return true;
        }
    }

    matches!(
        error.database_code(),
        Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
    )
}

/// Coarse error category used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The call was never attempted because the breaker is open.
    CircuitOpen,
    /// The call ran out of time.
    Timeout,
    /// The dependency failed in a way that may clear up.
    Transient,
    /// Validation or programmer error; retrying will not help.
    Permanent,
}

/// Categorise an error.
pub fn classify<E>(error: &E) -> ErrorKind
where
    E: ErrorSignals + ?Sized,
{
    if error.is_circuit_open() {
        ErrorKind::CircuitOpen
    } else if error.is_timeout() {
        ErrorKind::Timeout
    } else if is_transient_error(Some(error)) {
        ErrorKind::Transient
    } else {
        ErrorKind::Permanent
    }
}

/// Error raised by a call to an external dependency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct UpstreamError {
    message: String,
    status: Option<u16>,
    database_code: Option<String>,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            database_code: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_database_code(mut self, code: impl Into<String>) -> Self {
        self.database_code = Some(code.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl ErrorSignals for UpstreamError {
    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn database_code(&self) -> Option<&str> {
        self.database_code.as_deref()
    }
}

impl ErrorSignals for std::io::Error {
    fn is_timeout(&self) -> bool {
        self.kind() == std::io::ErrorKind::TimedOut
    }
}

impl<E: ErrorSignals + ?Sized> ErrorSignals for Box<E> {
    fn status_code(&self) -> Option<u16> {
        (**self).status_code()
    }

    fn database_code(&self) -> Option<&str> {
        (**self).database_code()
    }

    fn is_circuit_open(&self) -> bool {
        (**self).is_circuit_open()
    }

    fn is_timeout(&self) -> bool {
        (**self).is_timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_error_is_not_transient() {
        assert!(!is_transient_error::<UpstreamError>(None));
    }

    #[test]
    fn test_open_circuit_is_never_transient() {
        use crate::resilience::circuit_breaker::BreakerError;

        for name in ["db-connection", "network-gateway", "timeout-svc"] {
            let err: BreakerError<UpstreamError> = BreakerError::Open {
                name: name.to_string(),
            };
            assert!(!is_transient_error(Some(&err)), "breaker {name}");
            assert_eq!(classify(&err), ErrorKind::CircuitOpen);
        }
    }

    #[test]
    fn test_message_markers() {
        for message in [
            "Network unreachable",
            "request TIMEOUT",
            "Connection refused",
            "read ECONNRESET",
            "getaddrinfo ENOTFOUND api.example.com",
        ] {
            assert!(
                is_transient_error(Some(&UpstreamError::new(message))),
                "{message}"
            );
        }
        assert!(!is_transient_error(Some(&UpstreamError::new("invalid email"))));
    }

    #[test]
    fn test_status_codes() {
        let with_status = |s: u16| UpstreamError::new("upstream said no").with_status(s);
        assert!(is_transient_error(Some(&with_status(500))));
        assert!(is_transient_error(Some(&with_status(503))));
        assert!(is_transient_error(Some(&with_status(429))));
        assert!(!is_transient_error(Some(&with_status(400))));
        assert!(!is_transient_error(Some(&with_status(404))));
        assert!(!is_transient_error(Some(&with_status(499))));
    }

    #[test]
    fn test_database_codes() {
        let with_code = |c: &str| UpstreamError::new("could not serialize").with_database_code(c);
        assert!(is_transient_error(Some(&with_code(SERIALIZATION_FAILURE))));
        assert!(is_transient_error(Some(&with_code(DEADLOCK_DETECTED))));
        assert!(!is_transient_error(Some(&with_code("23505"))));
    }

    #[test]
    fn test_classification_is_stable() {
        let error = UpstreamError::new("gateway").with_status(502);
        let first = is_transient_error(Some(&error));
        let second = is_transient_error(Some(&error));
        assert_eq!(first, second);
        assert!(first);
    }

    #[test]
    fn test_io_errors() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset by peer");
        assert!(is_transient_error(Some(&reset)));
        assert_eq!(classify(&reset), ErrorKind::Transient);

        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline passed");
        assert_eq!(classify(&timed_out), ErrorKind::Timeout);

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(classify(&denied), ErrorKind::Permanent);
    }

    #[test]
    fn test_boxed_errors_delegate() {
        let boxed: Box<UpstreamError> = Box::new(UpstreamError::new("x").with_status(503));
        assert!(is_transient_error(Some(&boxed)));
    }
}
