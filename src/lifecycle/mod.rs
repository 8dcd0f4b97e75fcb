//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Ctrl+C received → trigger() → HTTP server drains, rate limit sweeper exits
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task holds its own receiver
//! - Ordered shutdown: stop accept, drain, exit

pub mod shutdown;

pub use shutdown::Shutdown;
