//! Time source for the ingestion wait loop.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Monotonic clock with an awaitable sleep.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created.
    fn elapsed(&self) -> Duration;

    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by the Tokio timer.
pub struct TokioClock {
    started: Instant,
}

impl TokioClock {
    /// Start a clock at the current instant.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
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
        self.started.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
