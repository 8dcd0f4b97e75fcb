//! HTTP surface subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, TraceLayer)
//!     → security::rate_limit middleware (429 / X-RateLimit-* headers)
//!     → health handlers
//!     → response.rs (failures → 503 / 500 JSON)
//! ```

pub mod response;
pub mod server;

pub use response::{error_response, failure_response, ErrorBody};
pub use server::{build_router, AppState, HttpServer};
