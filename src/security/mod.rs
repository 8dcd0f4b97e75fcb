//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (resolve client identity from proxy headers)
//!     → rate_limit.rs (count the request in its fixed window, 429 when over)
//!     → Pass to routing
//!
//! Background:
//!     sweeper.rs (drop expired windows every 5 minutes)
//! ```
//!
//! # Design Decisions
//! - One shared store; limiters namespace their keys by name
//! - Limiter failures answer 503 instead of failing the whole pipeline

pub mod headers;
pub mod rate_limit;
pub mod sweeper;

pub use headers::client_identity;
pub use rate_limit::{
    rate_limit_middleware, RateLimitDecision, RateLimitError, RateLimitPolicy, RateLimitTier,
    RateLimiter, RateLimiterStore,
};
pub use sweeper::RateLimitSweeper;
