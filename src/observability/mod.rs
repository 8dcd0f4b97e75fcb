//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resilience/ and security/ produce:
//!     → logging.rs (tracing events with breaker / limiter fields)
//!     → metrics.rs (counters and gauges, scraped by Prometheus)
//! ```

pub mod logging;
pub mod metrics;
