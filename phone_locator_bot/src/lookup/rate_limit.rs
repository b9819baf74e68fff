use std::time::Duration;

use tokio::{
    sync::Mutex,
    time::{sleep, Instant},
};

/// Extra sleep past the window edge, so a freed slot is really free.
const SLOT_BUFFER: Duration = Duration::from_millis(100);

/// `await_slot` re-checks at most this many times before giving up and
/// letting the request through. The limiter is advisory; the upstream
/// API still answers 429 if we misjudge.
const MAX_WAIT_ROUNDS: u32 = 32;

/// Sliding-window rate limiter for an upstream API.
/// Purely in-process and advisory; nothing is persisted.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<Vec<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// True iff a new request fits in the window right now.
    pub async fn can_admit(&self) -> bool {
        let mut requests = self.requests.lock().await;
        Self::prune(&mut requests, self.window);
        requests.len() < self.max_requests
    }

    /// Record an admitted request. Call `can_admit` or `await_slot` first.
    pub async fn record(&self) {
        self.requests.lock().await.push(Instant::now());
    }

    /// Suspend until `can_admit` would return true.
    pub async fn await_slot(&self) {
        for _ in 0..MAX_WAIT_ROUNDS {
            let wait = {
                let mut requests = self.requests.lock().await;
                Self::prune(&mut requests, self.window);
                if requests.len() < self.max_requests {
                    return;
                }
                let oldest = requests[0];
                self.window - oldest.elapsed() + SLOT_BUFFER
            };

            log::debug!("Rate limit hit. Waiting {}ms before next request...", wait.as_millis());
            sleep(wait).await;
        }

        log::warn!("Rate limiter window never cleared; proceeding anyway");
    }

    fn prune(requests: &mut Vec<Instant>, window: Duration) {
        let now = Instant::now();
        requests.retain(|time| now.duration_since(*time) < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn window_fills_and_drains() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        assert!(limiter.can_admit().await);
        limiter.record().await;
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(limiter.can_admit().await);
        limiter.record().await;
        assert!(!limiter.can_admit().await);

        // The first timestamp leaves the window 60s after it was recorded.
        tokio::time::advance(Duration::from_secs(51)).await;
        assert!(limiter.can_admit().await);
    }

    #[tokio::test(start_paused = true)]
    async fn await_slot_suspends_until_free() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.record().await;
        assert!(!limiter.can_admit().await);

        let started = Instant::now();
        limiter.await_slot().await;
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert!(limiter.can_admit().await);
    }
}
