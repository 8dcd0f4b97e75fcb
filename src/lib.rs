//! Resilience core for the "What's for Dinner" service.
//!
//! Retries with backoff, per-dependency circuit breakers, transient-error
//! classification, graceful degradation and fixed-window rate limiting,
//! plus the axum surface that exposes them.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
