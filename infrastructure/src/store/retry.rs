//! Bounded exponential backoff for transient store contention
//!
//! Only errors classified transient by [`StoreError::is_transient`] are
//! retried. The connection lock is re-acquired fresh on every attempt
//! and never held across a backoff sleep.
//!
//! [`BackoffPolicy::run`] sleeps the calling thread between attempts,
//! matching the synchronous `RunStore` contract. The worst case with the
//! default schedule is ~450ms, within what callers on an async runtime
//! tolerate inline for local SQLite writes. Keep total backoff well under
//! a second if the schedule changes.

use std::time::Duration;

use conclave_application::StoreError;
use rand::Rng;
use tracing::debug;

/// Backoff schedule: initial_delay * multiplier^(attempt-1), jittered
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    /// Fractional jitter applied to each delay, e.g. 0.5 for +/-50%
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            jitter: 0.5,
        }
    }
}

impl BackoffPolicy {
    /// Jittered delay before the given retry attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let factor = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter)
        } else {
            1.0
        };
        Duration::from_millis((base * factor).max(0.0) as u64)
    }

    /// Run an operation with bounded retry on transient errors
    pub fn run<T, F>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Result<T, StoreError>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "store contention, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
