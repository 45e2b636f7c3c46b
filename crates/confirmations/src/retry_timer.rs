//! Retry scheduling with capped exponential backoff.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::timer::Timer;

pub const DEFAULT_MAX_BACKOFF_DELAY: Duration = Duration::from_secs(60 * 60);

pub struct RetryTimer {
    timer: Timer,
    backoff_count: AtomicU32,
    max_backoff_delay: Duration,
}

impl RetryTimer {
    pub fn new(max_backoff_delay: Duration) -> Self {
        Self {
            timer: Timer::new(),
            backoff_count: AtomicU32::new(0),
            max_backoff_delay,
        }
    }

    pub fn without_jitter(max_backoff_delay: Duration) -> Self {
        Self {
            timer: Timer::without_jitter(),
            backoff_count: AtomicU32::new(0),
            max_backoff_delay,
        }
    }

    /// Schedules the next retry. Each call doubles the delay (the first call
    /// already doubles once), capped at the maximum backoff. Returns the
    /// fire time.
    pub fn start_with_backoff<F>(&self, delay: Duration, fut: F) -> Instant
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let count = self.backoff_count.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = backoff_delay(delay, count, self.max_backoff_delay);
        debug!(
            retry = count,
            delay_secs = delay.as_secs_f64(),
            "retry armed"
        );
        self.timer.start(delay, fut)
    }

    /// Cancels the pending retry and resets the backoff.
    pub fn stop(&self) {
        self.timer.stop();
        self.backoff_count.store(0, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    pub fn backoff_count(&self) -> u32 {
        self.backoff_count.load(Ordering::SeqCst)
    }
}

/// `min(delay << count, max)`, saturating so large counts never overflow.
fn backoff_delay(delay: Duration, count: u32, max: Duration) -> Duration {
    let shifted = delay
        .as_millis()
        .saturating_mul(1u128 << count.min(64) as u32);
    let capped = shifted.min(max.as_millis());
    // Fits u64: capped never exceeds the configured maximum.
    Duration::from_millis(capped as u64)
}
