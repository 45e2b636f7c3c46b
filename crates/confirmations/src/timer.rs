//! One-shot timer with privacy-preserving jitter.
//!
//! Scheduled work fires after an exponentially distributed delay whose mean
//! is the requested delay, so request timing does not fingerprint the
//! client. Tests construct timers without jitter for determinism.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

pub struct Timer {
    handle: Mutex<Option<JoinHandle<()>>>,
    jitter: bool,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            handle: Mutex::new(None),
            jitter: true,
        }
    }

    pub fn without_jitter() -> Self {
        Self {
            handle: Mutex::new(None),
            jitter: false,
        }
    }

    /// Schedules `fut` to run once after `delay` (jittered unless disabled),
    /// replacing any previously scheduled run. Returns the fire time.
    pub fn start<F>(&self, delay: Duration, fut: F) -> Instant
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.stop();

        let delay = if self.jitter {
            jittered(delay)
        } else {
            delay
        };
        let fire_at = Instant::now() + delay;
        debug!(delay_secs = delay.as_secs_f64(), "timer armed");

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fut.await;
        });
        *self.handle.lock().unwrap() = Some(handle);
        fire_at
    }

    /// Cancels the pending run, if any. Safe to call repeatedly.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Samples an exponential distribution with mean `delay`.
fn jittered(delay: Duration) -> Duration {
    let uniform: f64 = rand::random::<f64>().max(f64::MIN_POSITIVE);
    delay.mul_f64(-uniform.ln())
}
