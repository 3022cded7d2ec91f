//! Randomised pacing for the throttled forum endpoints

use crate::config::CrawlerConfig;
use rand::Rng;
use std::time::Duration;

/// Draws a uniformly random delay between two bounds before each request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min_ms: u64,
    max_ms: u64,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        let min_ms = min.as_millis() as u64;
        let max_ms = (max.as_millis() as u64).max(min_ms);
        Self { min_ms, max_ms }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.pacing_min_delay),
            Duration::from_millis(config.pacing_max_delay),
        )
    }

    /// No delay at all
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn next_delay(&self) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }

    /// Sleeps for a freshly drawn delay
    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tracing::trace!("Pacing for {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }
}
