use std::time::{Duration, Instant};

use dashmap::DashMap;
use duet_types::PlayerId;

/// Token bucket applied to every inbound frame of one connection
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tokens: u32,
    max_tokens: u32,
    refill_rate: Duration,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::new_with_limits(30, Duration::from_millis(500))
    }

    pub fn new_with_limits(max_tokens: u32, refill_rate: Duration) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    pub fn check_rate_limit(&mut self) -> bool {
        self.refill_tokens();

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill_tokens(&mut self) {
        let elapsed = self.last_refill.elapsed();
        let rate_ms = self.refill_rate.as_millis().max(1);
        let tokens_to_add = (elapsed.as_millis() / rate_ms) as u32;

        if tokens_to_add > 0 {
            self.tokens = self.tokens.saturating_add(tokens_to_add).min(self.max_tokens);
            self.last_refill += self.refill_rate * tokens_to_add;
        }
    }

    pub fn get_remaining_tokens(&mut self) -> u32 {
        self.refill_tokens();
        self.tokens
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimum interval between chat messages from one sender
pub struct ChatThrottle {
    min_interval: Duration,
    last_sent: DashMap<PlayerId, Instant>,
}

impl ChatThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sent: DashMap::new(),
        }
    }

    /// Records the attempt and reports whether it is allowed
    pub fn check(&self, player_id: &str) -> bool {
        let now = Instant::now();
        let mut allowed = true;

        self.last_sent
            .entry(player_id.to_string())
            .and_modify(|last| {
                if now.duration_since(*last) < self.min_interval {
                    allowed = false;
                } else {
                    *last = now;
                }
            })
            .or_insert(now);

        allowed
    }

    pub fn forget(&self, player_id: &str) {
        self.last_sent.remove(player_id);
    }

    pub fn tracked_senders(&self) -> usize {
        self.last_sent.len()
    }
}
