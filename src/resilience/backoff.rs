//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

use crate::resilience::retries::RetryConfig;

/// Calculate the pre-jitter delay that follows a failed `attempt` (1-indexed).
///
/// `min(base_delay * multiplier^(attempt - 1), max_delay)`, saturating.
pub fn delay_for_attempt(attempt: u32, config: &RetryConfig) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = config.base_delay.as_millis() as f64;
    let max_ms = config.max_delay.as_millis() as f64;
    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let delay_ms = base_ms * config.backoff_multiplier.powi(exponent);

    if !delay_ms.is_finite() || delay_ms >= max_ms {
        return config.max_delay;
    }

    Duration::from_millis(delay_ms as u64)
}

/// Scale `delay` by a uniform factor in `[0.5, 1.0]`, floored to whole milliseconds.
pub fn apply_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.5..=1.0);
    let jittered_ms = (delay.as_millis() as f64 * factor).floor();
    Duration::from_millis(jittered_ms as u64)
}

/// Delay to wait after a failed `attempt`, jittered when the config asks for it.
pub fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let delay = delay_for_attempt(attempt, config);
    if config.jitter {
        apply_jitter(delay)
    } else {
        delay
    }
}
