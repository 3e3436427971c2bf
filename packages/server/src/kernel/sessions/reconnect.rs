//! Reconnect backoff schedule for gateway clients.
//!
//! The server side of reconnection is just `join_session`; clients pace
//! their retries with this policy.

use std::time::Duration;

/// Bounded exponential backoff: `base * 2^attempt`, capped at `max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
    /// Give up after this many consecutive failures; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based), or `None` once the
    /// attempt limit is reached.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if let Some(max_attempts) = self.max_attempts {
            if attempt >= max_attempts {
                return None;
            }
        }
        let factor = 2u32.saturating_pow(attempt.min(16));
        Some(self.base.saturating_mul(factor).min(self.max))
    }
}
