//! Time source for the resilience primitives.
//!
//! Everything that reads time or sleeps goes through [`Clock`], so tests can
//! drive backoff schedules and recovery windows without waiting on the wall clock.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{self, BoxFuture, FutureExt};
use tokio::time::Instant;

/// Monotonic time, wall time and cooperative sleep.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Monotonic reading used for elapsed-time arithmetic.
    fn now(&self) -> Instant;

    /// Wall-clock reading used for timestamps exposed to clients.
    fn utc_now(&self) -> DateTime<Utc>;

    /// Suspend the calling task for `duration` without blocking the runtime.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Production clock backed by `tokio::time`.
///
/// Respects `tokio::time::pause()`, so paused-runtime tests work with it too.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed()
    }
}

/// Manually advanced clock. A testing aid; production code uses [`TokioClock`].
///
/// `sleep` advances the clock by the requested duration and resolves immediately.
/// Exported so integration tests and downstream crates can drive breakers,
/// retries and limiters deterministically.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
    inner: Mutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    offset: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Clock whose wall reading starts at `wall_origin`.
    pub fn starting_at(wall_origin: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            inner: Mutex::new(ManualState::default()),
        }
    }

    /// Move time forward.
    pub fn advance(&self, duration: Duration) {
        let mut inner = self.inner.lock().expect("manual clock mutex poisoned");
        inner.offset += duration;
    }

    /// Total time advanced since construction.
    pub fn elapsed(&self) -> Duration {
        self.inner.lock().expect("manual clock mutex poisoned").offset
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner
            .lock()
            .expect("manual clock mutex poisoned")
            .sleeps
            .clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.elapsed())
            .ok()
            .and_then(|offset| self.wall_origin.checked_add_signed(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        {
            let mut inner = self.inner.lock().expect("manual clock mutex poisoned");
            inner.offset += duration;
            inner.sleeps.push(duration);
        }
        future::ready(()).boxed()
    }
}
