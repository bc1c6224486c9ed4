//! Randomized delay between successive requests to one source.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

/// Paces the requests of a single scrape.
///
/// The first call to [`RequestPacer::pace`] returns immediately; every
/// later call sleeps for a uniformly random duration in `[min, max]`.
/// Create one pacer per scrape so the state never leaks across runs.
#[derive(Debug, Clone)]
pub struct RequestPacer {
    min: Duration,
    max: Duration,
    requests: u32,
}

impl RequestPacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        // Tolerate swapped bounds rather than panicking in gen_range
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            requests: 0,
        }
    }

    /// A pacer that never sleeps.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Pick the delay for the next request without sleeping.
    pub fn next_delay(&mut self) -> Duration {
        self.requests += 1;
        if self.requests == 1 || self.max.is_zero() {
            return Duration::ZERO;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
    }

    /// Wait before issuing the next request.
    pub async fn pace(&mut self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis(), "Pacing request");
            tokio::time::sleep(delay).await;
        }
    }

    /// Number of requests paced so far.
    pub fn requests(&self) -> u32 {
        self.requests
    }
}
