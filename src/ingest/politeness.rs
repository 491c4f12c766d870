// src/ingest/politeness.rs
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::Instant;

/// Spacing policy applied before each markup-scraped request.
#[async_trait]
pub trait Politeness: Send + Sync {
    async fn before_request(&self, host: &str);
}

/// No waiting. Used in tests and fixture runs.
pub struct NoDelay;

#[async_trait]
impl Politeness for NoDelay {
    async fn before_request(&self, _host: &str) {}
}

/// Spaces requests to the same host by a random gap in `[min, max]`.
///
/// Each call reserves the next free slot for its host before sleeping, so
/// concurrent callers hitting one host queue up instead of firing together.
/// Different hosts never wait on each other.
pub struct RandomDelay {
    min: Duration,
    max: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl RandomDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    fn random_gap(&self) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }

    /// Returns the instant at which the caller may send its request.
    fn reserve(&self, host: &str) -> Instant {
        let now = Instant::now();
        let gap = self.random_gap();
        let mut slots = match self.next_slot.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let at = slots.get(host).copied().map_or(now, |slot| slot.max(now));
        slots.insert(host.to_string(), at + gap);
        at
    }
}

#[async_trait]
impl Politeness for RandomDelay {
    async fn before_request(&self, host: &str) {
        let at = self.reserve(host);
        if at > Instant::now() {
            let wait_ms = at.saturating_duration_since(Instant::now()).as_millis() as u64;
            tracing::debug!(host, wait_ms, "politeness delay");
            tokio::time::sleep_until(at).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_request_per_host_is_immediate_then_spaced() {
        let p = RandomDelay::new(Duration::from_millis(1000), Duration::from_millis(3000));
        let t0 = Instant::now();
        p.before_request("internshala.com").await;
        assert_eq!(Instant::now(), t0);

        p.before_request("internshala.com").await;
        let waited = Instant::now() - t0;
        assert!(waited >= Duration::from_millis(1000) && waited <= Duration::from_millis(3000));

        // another host is not held back by the first one
        let t1 = Instant::now();
        p.before_request("www.hackerearth.com").await;
        assert_eq!(Instant::now(), t1);
    }

    #[test]
    fn swapped_bounds_are_reordered() {
        let p = RandomDelay::new(Duration::from_millis(50), Duration::from_millis(10));
        for _ in 0..20 {
            let g = p.random_gap();
            assert!(g >= Duration::from_millis(10) && g <= Duration::from_millis(50));
        }
    }
}
