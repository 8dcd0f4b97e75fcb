//! Background removal of expired rate-limit windows.
//!
//! # Responsibilities
//! - Periodically drop windows whose reset time has passed
//! - Keep the store bounded by the number of recently active identities

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::resilience::clock::{Clock, TokioClock};
use crate::security::rate_limit::RateLimiterStore;

/// Default sweep period.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

pub struct RateLimitSweeper {
    store: Arc<RateLimiterStore>,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimitSweeper {
    pub fn new(store: Arc<RateLimiterStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            clock: Arc::new(TokioClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run one sweep now. Returns the number of windows removed.
    pub fn sweep(&self) -> usize {
        let removed = self.store.sweep_expired(self.clock.now());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.store.len(), "Swept expired rate limit windows");
        }
        removed
    }

    /// Sweep every `interval` until shutdown. The first sweep happens one interval after start.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Rate limit sweeper starting");

        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
