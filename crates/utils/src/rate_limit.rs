//! rate_limit
//!
//! A sliding-window request counter, used to cap realm-list requests at
//! 3 per 10 seconds per connection without pulling in a timer-wheel
//! dependency for something this small.

use std::{collections::VecDeque, time::{Duration, Instant}};

/// A sliding window over the last `window` of wall-clock time, allowing
/// at most `limit` hits within it.
#[derive(Debug)]
pub struct RateWindow {
    limit: usize,
    window: Duration,
    hits: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: VecDeque::with_capacity(limit),
        }
    }

    /// Records a hit at `now` and reports whether it falls within the
    /// allowed rate. Hits older than the window are evicted first, so a
    /// caller that calls this once per incoming request gets an
    /// accurate rolling count without a background sweep.
    pub fn check(&mut self, now: Instant) -> bool {
        while let Some(&oldest) = self.hits.front() {
            if now.duration_since(oldest) > self.window {
                self.hits.pop_front();
            } else {
                break;
            }
        }

        if self.hits.len() >= self.limit {
            return false;
        }

        self.hits.push_back(now);
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allows_up_to_the_limit() {
        let mut window = RateWindow::new(3, Duration::from_secs(10));
        let now = Instant::now();
        assert!(window.check(now));
        assert!(window.check(now));
        assert!(window.check(now));
        assert!(!window.check(now));
    }

    #[test]
    fn evicts_hits_once_the_window_passes() {
        let mut window = RateWindow::new(1, Duration::from_millis(10));
        let now = Instant::now();
        assert!(window.check(now));
        assert!(!window.check(now));
        assert!(window.check(now + Duration::from_millis(11)));
    }
}
