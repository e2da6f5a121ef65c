//! Bounded exponential backoff for a single async probe.
//!
//! The probe reports success as `true`; any fault must already be folded
//! into `false` by the caller. Delays double after every failure up to a
//! ceiling (1, 2, 4, 8, 16, 32, 32, ... with the defaults) and no sleep
//! follows the final attempt.

use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
        }
    }

    /// Sleeps taken between attempts, in order. Has `max_attempts - 1` entries.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let max_delay = self.max_delay;
        let count = self.max_attempts.saturating_sub(1) as usize;
        std::iter::successors(Some(self.initial_delay.min(max_delay)), move |d| {
            Some(d.saturating_mul(2).min(max_delay))
        })
        .take(count)
    }

    /// Total time spent sleeping when every attempt fails.
    pub fn total_delay(&self) -> Duration {
        self.delays().sum()
    }

    /// Run `action` until it returns `true` or attempts are exhausted.
    pub async fn run<F, Fut>(&self, mut action: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut delays = self.delays();
        for attempt in 1..=self.max_attempts {
            if action().await {
                return true;
            }
            if attempt < self.max_attempts
                && let Some(delay) = delays.next()
            {
                tokio::time::sleep(delay).await;
            }
        }
        false
    }
}
