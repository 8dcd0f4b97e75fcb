//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the health handlers
//! - Wire up middleware (tracing, rate limiting)
//! - Serve on a listener until the shutdown broadcast fires

use std::future::Future;
use std::sync::Arc;

use axum::{extract::State, middleware, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::resilience::circuit_breaker::{BreakerError, BreakerStatus, CircuitState};
use crate::resilience::classify::{is_transient_error, ErrorSignals};
use crate::resilience::registry::CircuitBreakerRegistry;
use crate::resilience::retries::{Retry, RetryConfig};
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter, RateLimiterStore};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub limiter_store: Arc<RateLimiterStore>,
    /// `None` when rate limiting is disabled.
    pub limiter: Option<Arc<RateLimiter>>,
    /// Retry policy for outbound calls made through [`AppState::call_dependency`].
    pub retry: RetryConfig,
}

impl AppState {
    /// Call the named dependency: transient failures are retried with the
    /// configured policy, and the whole retry run counts as one breaker call.
    pub async fn call_dependency<T, E, F, Fut>(&self, dependency: &str, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorSignals + 'static,
    {
        let retry = Retry::new(self.retry.clone()).retry_if(|err: &E| is_transient_error(Some(err)));
        self.breakers
            .get_or_create(dependency)
            .execute(|| async move { retry.execute(operation).await })
            .await
    }
}

/// `GET /health` body.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// `"ok"`, or `"degraded"` while any breaker is open.
    pub status: &'static str,
    pub breakers: Vec<BreakerStatus>,
}

/// `GET /health/rate-limits` body.
#[derive(Debug, Serialize)]
pub struct RateLimitReport {
    pub enabled: bool,
    pub tracked_clients: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limiter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_secs: Option<u64>,
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/health/rate-limits", get(rate_limits))
        .with_state(state.clone());

    let router = match state.limiter {
        Some(limiter) => router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let breakers = state.breakers.statuses();
    let status = if breakers.iter().any(|b| b.state == CircuitState::Open) {
        "degraded"
    } else {
        "ok"
    };
    Json(HealthReport { status, breakers })
}

async fn rate_limits(State(state): State<AppState>) -> Json<RateLimitReport> {
    let limiter = state.limiter.as_deref();
    Json(RateLimitReport {
        enabled: limiter.is_some(),
        tracked_clients: state.limiter_store.len(),
        limiter: limiter.map(|l| l.name().to_string()),
        limit: limiter.map(|l| l.policy().requests),
        window_secs: limiter.map(|l| l.policy().window.as_secs()),
    })
}

/// HTTP server for the resilience surface.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
