//! Sliding-window rate limiter keyed by message origin.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

pub struct RateLimiter {
    max_messages: usize,
    window: Duration,
    seen: HashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_messages: usize, window: Duration) -> Self {
        Self {
            max_messages,
            window,
            seen: HashMap::new(),
        }
    }

    /// Records the message and returns whether it is within budget.
    /// Dropped messages are not recorded.
    pub fn allow(&mut self, origin: &str, now: Instant) -> bool {
        self.prune_idle(now);
        let stamps = self.seen.entry(origin.to_string()).or_default();
        if stamps.len() >= self.max_messages {
            return false;
        }
        stamps.push_back(now);
        true
    }

    /// Slides every origin's window to `now` and forgets origins with no
    /// message left in it. Returns how many origins were removed.
    pub fn prune_idle(&mut self, now: Instant) -> usize {
        let window = self.window;
        let before = self.seen.len();
        self.seen.retain(|_, stamps| {
            while stamps
                .front()
                .is_some_and(|&t| now.saturating_duration_since(t) >= window)
            {
                stamps.pop_front();
            }
            !stamps.is_empty()
        });
        before - self.seen.len()
    }

    pub fn tracked_origins(&self) -> usize {
        self.seen.len()
    }
}
