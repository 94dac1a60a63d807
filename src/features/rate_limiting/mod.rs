//! # Feature: Rate Limiting
//!
//! Sliding window limit on how many messages and button presses one user can
//! send. Uses DashMap so concurrent event handlers never block each other.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use dashmap::DashMap;
use std::time::{Duration, Instant};

pub const RATE_LIMITED_MESSAGE: &str = "You're sending messages too quickly! Please slow down.";

pub struct RateLimiter {
    requests: DashMap<u64, Vec<Instant>>,
    max_requests: usize,
    time_window: Duration,
}

impl Default for RateLimiter {
    /// 10 events per user per minute
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

impl RateLimiter {
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        RateLimiter {
            requests: DashMap::new(),
            max_requests,
            time_window,
        }
    }

    /// Record an event for `user_id`; false if the user is over the limit
    pub fn check(&self, user_id: u64) -> bool {
        let now = Instant::now();
        let mut entry = self.requests.entry(user_id).or_default();

        entry.retain(|&time| now.duration_since(time) < self.time_window);

        if entry.len() >= self.max_requests {
            false
        } else {
            entry.push(now);
            true
        }
    }
}
