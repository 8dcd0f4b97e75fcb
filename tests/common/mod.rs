//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use dinner_resilience::resilience::{ManualClock, UpstreamError};

/// A dependency that fails with a configurable error until told to recover.
#[derive(Debug)]
pub struct FlakyDependency {
    calls: AtomicU32,
    healthy: AtomicBool,
    status: u16,
}

impl FlakyDependency {
    /// Failing dependency answering with `status`.
    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            healthy: AtomicBool::new(false),
            status,
        })
    }

    pub async fn call(&self) -> Result<&'static str, UpstreamError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.healthy.load(Ordering::SeqCst) {
            Ok("tonight: mushroom risotto")
        } else {
            Err(UpstreamError::new(format!("upstream call {n} failed")).with_status(self.status))
        }
    }

    pub fn recover(&self) {
        self.healthy.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Manual clock shared by every component under test.
pub fn shared_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new())
}

/// GET `uri` as client `ip` (sent through `X-Forwarded-For`).
pub fn get_as(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", format!("{ip}, 10.0.0.1"))
        .body(Body::empty())
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
