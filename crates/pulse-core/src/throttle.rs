//! Fixed pacing between consecutive remote calls.
//!
//! The CRM rate-limits per API family. Rather than reacting to 429s, every
//! call that consumes budget is followed by [`Throttle::wait`].

use std::time::Duration;

/// Static inter-call delay. No backoff, no adaptation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Throttle {
    delay: Duration,
}

impl Throttle {
    /// Create a throttle that sleeps `delay` on every [`wait`](Self::wait).
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Create a throttle from a millisecond count.
    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// A throttle that never sleeps.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// The configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Suspend the caller for the configured delay.
    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
