//! Fixed-window send throttle, keyed by user id.
//!
//! Owned, injectable state rather than a process-wide singleton, so every
//! test gets its own counter map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<i64, Window>>>,
    max_per_window: u32,
    window: Duration,
}

struct Window {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_per_window,
            window,
        }
    }

    /// Limiter that never rejects, for tests that exercise other paths.
    pub fn unlimited() -> Self {
        Self::new(u32::MAX, Duration::from_secs(60))
    }

    /// Count one request against `key`. Returns false once the key has used
    /// up its window budget; an expired window resets the count first.
    pub fn try_acquire(&self, key: i64) -> bool {
        let now = Instant::now();
        let mut map = self.inner.lock().unwrap();

        // Drop stale windows so the map does not grow with one-off senders.
        map.retain(|_, w| now.duration_since(w.started) < self.window);

        let window = map.entry(key).or_insert(Window { started: now, count: 0 });
        if window.count >= self.max_per_window {
            return false;
        }
        window.count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforces_budget_per_key() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.try_acquire(1));
        assert!(limiter.try_acquire(1));
        assert!(!limiter.try_acquire(1));
        // Another key has its own budget.
        assert!(limiter.try_acquire(2));
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        assert!(limiter.try_acquire(1));
        assert!(!limiter.try_acquire(1));
        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.try_acquire(1));
    }

    #[test]
    fn instances_are_isolated() {
        let a = RateLimiter::new(1, Duration::from_secs(60));
        let b = RateLimiter::new(1, Duration::from_secs(60));
        assert!(a.try_acquire(1));
        assert!(b.try_acquire(1));
    }
}
