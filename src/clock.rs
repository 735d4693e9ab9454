//! Time source used for pacing, backoff and deadlines
//!
//! Production code runs on [`TokioClock`]; tests drive the same components with
//! [`ManualClock`], whose `sleep` advances virtual time instantly.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock was created
    fn elapsed(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by `tokio::time`
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed-interval pacer: guarantees a minimum spacing between consecutive ticks
pub struct Pacer {
    interval: Duration,
    last_tick: Option<Duration>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_tick: None,
        }
    }

    /// Wait until the next tick is allowed, sleeping no further than `deadline`
    pub async fn tick(&mut self, clock: &dyn Clock, deadline: Duration) {
        if let Some(last) = self.last_tick {
            let next = last + self.interval;
            let target = next.min(deadline);
            let now = clock.elapsed();
            if target > now {
                clock.sleep(target - now).await;
            }
        }
        self.last_tick = Some(clock.elapsed());
    }
}

#[cfg(test)]
pub use manual::ManualClock;
