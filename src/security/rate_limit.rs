//! Fixed-window rate limiting keyed by client identity.
//!
//! Each identity gets one `{count, reset_at}` window. The counter is bumped
//! before the limit check, so with `requests = N` the (N+1)th request in a
//! window is the first one denied.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::clock::{Clock, TokioClock};
use crate::security::headers::client_identity;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(requests: u32, window: Duration) -> Self {
        Self { requests, window }
    }

    /// 10 requests per minute.
    pub const fn strict() -> Self {
        Self::new(10, Duration::from_secs(60))
    }

    /// 100 requests per minute.
    pub const fn standard() -> Self {
        Self::new(100, Duration::from_secs(60))
    }

    /// 1000 requests per minute.
    pub const fn lenient() -> Self {
        Self::new(1000, Duration::from_secs(60))
    }

    /// 5 requests per 5 minutes, for login and signup.
    pub const fn auth() -> Self {
        Self::new(5, Duration::from_secs(300))
    }

    /// 20 requests per minute, for recipe generation.
    pub const fn generation() -> Self {
        Self::new(20, Duration::from_secs(60))
    }
}

/// Named presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitTier {
    Strict,
    Standard,
    Lenient,
    Auth,
    Generation,
}

impl RateLimitTier {
    pub const ALL: [RateLimitTier; 5] = [
        RateLimitTier::Strict,
        RateLimitTier::Standard,
        RateLimitTier::Lenient,
        RateLimitTier::Auth,
        RateLimitTier::Generation,
    ];

    pub fn policy(self) -> RateLimitPolicy {
        match self {
            RateLimitTier::Strict => RateLimitPolicy::strict(),
            RateLimitTier::Standard => RateLimitPolicy::standard(),
            RateLimitTier::Lenient => RateLimitPolicy::lenient(),
            RateLimitTier::Auth => RateLimitPolicy::auth(),
            RateLimitTier::Generation => RateLimitPolicy::generation(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RateLimitTier::Strict => "strict",
            RateLimitTier::Standard => "standard",
            RateLimitTier::Lenient => "lenient",
            RateLimitTier::Auth => "auth",
            RateLimitTier::Generation => "generation",
        }
    }
}

impl fmt::Display for RateLimitTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Limiter bookkeeping failures.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit window of {0:?} overflows the clock")]
    WindowOverflow(Duration),
    #[error("rate limit reset time out of range: {0}")]
    ResetOutOfRange(#[from] chrono::OutOfRangeError),
    #[error("invalid rate limit header value: {0}")]
    InvalidHeader(#[from] header::InvalidHeaderValue),
}

/// One identity's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEntry {
    pub count: u32,
    pub reset_at: Instant,
}

/// Process-wide window store shared by every limiter.
#[derive(Debug, Default)]
pub struct RateLimiterStore {
    entries: DashMap<String, WindowEntry>,
}

impl RateLimiterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request for `key`, opening a fresh window when none exists or the old one expired.
    ///
    /// The update holds the key's shard lock, so concurrent hits never undercount.
    pub fn hit(&self, key: &str, window: Duration, now: Instant) -> Result<WindowEntry, RateLimitError> {
        let fresh_reset = now
            .checked_add(window)
            .ok_or(RateLimitError::WindowOverflow(window))?;

        let mut entry = self.entries.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            reset_at: fresh_reset,
        });

        if now > entry.reset_at {
            *entry = WindowEntry {
                count: 0,
                reset_at: fresh_reset,
            };
        }
        entry.count = entry.count.saturating_add(1);

        Ok(*entry)
    }

    pub fn get(&self, key: &str) -> Option<WindowEntry> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    /// Drop every window whose reset time has passed. Returns how many were removed.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = now <= entry.reset_at;
            if !keep {
                removed += 1;
            }
            keep
        });
        metrics::record_rate_limit_entries(self.entries.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
    Limited {
        limit: u32,
        reset_at: DateTime<Utc>,
        retry_after_secs: u64,
    },
}

/// JSON body of a 429 response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitBody {
    pub error: String,
    pub message: String,
    pub retry_after: u64,
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        match self {
            RateLimitDecision::Allowed { reset_at, .. } | RateLimitDecision::Limited { reset_at, .. } => {
                *reset_at
            }
        }
    }

    /// `X-RateLimit-*` headers, plus `Retry-After` when limited.
    pub fn headers(&self) -> Result<HeaderMap, RateLimitError> {
        let (limit, remaining) = match self {
            RateLimitDecision::Allowed { limit, remaining, .. } => (*limit, *remaining),
            RateLimitDecision::Limited { limit, .. } => (*limit, 0),
        };
        let reset = self.reset_at().to_rfc3339_opts(SecondsFormat::Millis, true);

        let mut headers = HeaderMap::new();
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from_str(&reset)?);
        if let RateLimitDecision::Limited { retry_after_secs, .. } = self {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
        }
        Ok(headers)
    }

    /// The 429 response for a limited decision; `None` when the request may proceed.
    pub fn rejection(&self) -> Result<Option<Response>, RateLimitError> {
        let RateLimitDecision::Limited { retry_after_secs, .. } = self else {
            return Ok(None);
        };

        let body = RateLimitBody {
            error: "Too Many Requests".to_string(),
            message: format!("Rate limit exceeded. Try again in {retry_after_secs} seconds."),
            retry_after: *retry_after_secs,
        };
        Ok(Some(
            (StatusCode::TOO_MANY_REQUESTS, self.headers()?, Json(body)).into_response(),
        ))
    }
}

type Identifier = Arc<dyn Fn(&HeaderMap) -> String + Send + Sync>;

/// Fixed-window limiter applying one policy.
#[derive(Clone)]
pub struct RateLimiter {
    name: String,
    policy: RateLimitPolicy,
    store: Arc<RateLimiterStore>,
    clock: Arc<dyn Clock>,
    identifier: Identifier,
}

impl RateLimiter {
    /// `name` namespaces this limiter's keys inside the shared store.
    pub fn new(name: impl Into<String>, policy: RateLimitPolicy, store: Arc<RateLimiterStore>) -> Self {
        Self {
            name: name.into(),
            policy,
            store,
            clock: Arc::new(TokioClock),
            identifier: Arc::new(client_identity),
        }
    }

    pub fn for_tier(tier: RateLimitTier, store: Arc<RateLimiterStore>) -> Self {
        Self::new(tier.name(), tier.policy(), store)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the header-based identity extraction.
    pub fn with_identifier<F>(mut self, identifier: F) -> Self
    where
        F: Fn(&HeaderMap) -> String + Send + Sync + 'static,
    {
        self.identifier = Arc::new(identifier);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<RateLimiterStore> {
        &self.store
    }

    /// Check a request by its headers.
    pub fn check(&self, headers: &HeaderMap) -> Result<RateLimitDecision, RateLimitError> {
        let identity = (self.identifier)(headers);
        self.check_key(&identity)
    }

    /// Check a request from an already-resolved identity.
    pub fn check_key(&self, identity: &str) -> Result<RateLimitDecision, RateLimitError> {
        let now = self.clock.now();
        let key = format!("{}:{}", self.name, identity);
        let entry = self.store.hit(&key, self.policy.window, now)?;

        let until_reset = entry.reset_at.saturating_duration_since(now);
        let reset_at = self.clock.utc_now() + chrono::Duration::from_std(until_reset)?;
        let limit = self.policy.requests;

        if entry.count > limit {
            let retry_after_secs = until_reset.as_millis().div_ceil(1000) as u64;
            tracing::warn!(
                limiter = %self.name,
                client = %identity,
                count = entry.count,
                limit,
                retry_after_secs,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(&self.name);
            return Ok(RateLimitDecision::Limited {
                limit,
                reset_at,
                retry_after_secs,
            });
        }

        Ok(RateLimitDecision::Allowed {
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_at,
        })
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("clock", &self.clock)
            .finish()
    }
}

/// Middleware applying a [`RateLimiter`] to every request.
///
/// Denied requests get a 429 with retry guidance. If the limiter itself
/// fails, the request is answered with 503 instead of tearing down the
/// pipeline.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let outcome = limiter
        .check(request.headers())
        .and_then(|decision| Ok((decision.headers()?, decision.rejection()?)));

    match outcome {
        Ok((_, Some(rejection))) => rejection,
        Ok((headers, None)) => {
            let mut response = next.run(request).await;
            response.headers_mut().extend(headers);
            response
        }
        Err(e) => {
            tracing::error!(limiter = %limiter.name(), error = %e, "Rate limiter failed");
            metrics::record_rate_limit_error(limiter.name());
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "error": "Service Unavailable",
                    "message": "Rate limiting is temporarily unavailable",
                })),
            )
                .into_response()
        }
    }
}
