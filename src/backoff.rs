//! Reconnect backoff: `ln(1 + attempt) * 30s * rand[0, 1)`, unbounded in the
//! attempt count (the log growth keeps later retries from exploding without
//! needing an explicit cap).

use std::time::Duration;

use rand::Rng;

/// Computes reconnect delays from a monotonically increasing attempt count.
pub struct Backoff;

impl Backoff {
    /// Delay before the `attempt`-th reconnect (0-indexed: `attempt == 0` is
    /// the first retry after the initial disconnect).
    pub fn next(attempt: u32) -> Duration {
        let jitter: f64 = rand::rng().random_range(0.0..1.0);
        Self::next_with_jitter(attempt, jitter)
    }

    fn next_with_jitter(attempt: u32, jitter: f64) -> Duration {
        let seconds = ((1.0 + attempt as f64).ln()) * 30.0 * jitter;
        Duration::from_secs_f64(seconds.max(0.0))
    }
}
