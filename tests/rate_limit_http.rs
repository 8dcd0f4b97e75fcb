//! Rate limiting through the axum router.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, StatusCode};
use chrono::{TimeZone, Utc};
use tower::ServiceExt;

use dinner_resilience::http::{build_router, AppState};
use dinner_resilience::resilience::{CircuitBreakerRegistry, ManualClock, RetryConfig};
use dinner_resilience::security::{RateLimitPolicy, RateLimitTier, RateLimiter, RateLimiterStore};

mod common;

use common::{get_as, json_body};

fn app(policy: RateLimitPolicy) -> (axum::Router, Arc<ManualClock>, Arc<RateLimiterStore>) {
    let clock = Arc::new(ManualClock::starting_at(
        Utc.with_ymd_and_hms(2026, 10, 19, 18, 30, 0).unwrap(),
    ));
    let store = Arc::new(RateLimiterStore::new());
    let limiter = RateLimiter::new("strict", policy, store.clone()).with_clock(clock.clone());
    let router = build_router(AppState {
        breakers: Arc::new(CircuitBreakerRegistry::default()),
        limiter_store: store.clone(),
        limiter: Some(Arc::new(limiter)),
        retry: RetryConfig::default(),
    });
    (router, clock, store)
}

#[tokio::test]
async fn test_eleventh_request_is_rejected_with_retry_guidance() {
    let (router, _, _) = app(RateLimitTier::Strict.policy());

    for i in 1..=10u32 {
        let response = router.clone().oneshot(get_as("/health", "203.0.113.9")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {i}");
        assert_eq!(response.headers()["x-ratelimit-limit"], "10");
        assert_eq!(
            response.headers()["x-ratelimit-remaining"],
            (10 - i).to_string().as_str()
        );
        assert_eq!(response.headers()["x-ratelimit-reset"], "2026-10-19T18:31:00.000Z");
    }

    let response = router.clone().oneshot(get_as("/health", "203.0.113.9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

    let body = json_body(response).await;
    assert_eq!(body["error"], "Too Many Requests");
    assert_eq!(body["retryAfter"], 60);
    assert!(body["message"].as_str().unwrap().contains("60 seconds"));
}

#[tokio::test]
async fn test_window_resets_after_expiry() {
    let (router, clock, store) = app(RateLimitPolicy::new(2, Duration::from_secs(60)));

    for _ in 0..3 {
        let _ = router.clone().oneshot(get_as("/health", "198.51.100.4")).await.unwrap();
    }
    assert_eq!(store.get("strict:198.51.100.4").unwrap().count, 3);

    clock.advance(Duration::from_millis(60_001));
    let response = router.clone().oneshot(get_as("/health", "198.51.100.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "1");
    assert_eq!(store.get("strict:198.51.100.4").unwrap().count, 1);
}

#[tokio::test]
async fn test_clients_are_limited_independently() {
    let (router, _, _) = app(RateLimitPolicy::new(1, Duration::from_secs(60)));

    let first = router.clone().oneshot(get_as("/health", "192.0.2.1")).await.unwrap();
    let again = router.clone().oneshot(get_as("/health", "192.0.2.1")).await.unwrap();
    let other = router.clone().oneshot(get_as("/health", "192.0.2.2")).await.unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_limiter_failure_answers_503() {
    let (router, _, _) = app(RateLimitPolicy::new(1, Duration::MAX));

    let response = router.oneshot(get_as("/health", "192.0.2.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Service Unavailable");
}
