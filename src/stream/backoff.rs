//! Reconnect backoff policy.
//!
//! The policy is stateless per decision: the connection worker owns the
//! attempt counter and resets it after a successful open.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default retry budget before the connection is declared failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default delay before the first reconnect attempt.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Default upper bound for backoff growth.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Outcome of a reconnect decision.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReconnectDecision {
    /// Schedule another attempt after the given delay.
    Retry { delay: Duration },
    /// Retry budget exhausted; stop automatic reconnection.
    GiveUp,
}

/// Policy controlling reconnect attempts and exponential backoff growth.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    /// Maximum number of automatic reconnect attempts.
    pub max_attempts: u32,
    /// Delay used before the first reconnect attempt.
    pub initial_backoff: Duration,
    /// Upper bound for exponential backoff delay growth.
    pub max_backoff: Duration,
    /// Maximum random jitter added to each delay. Zero disables jitter.
    pub jitter: Duration,
}

impl ReconnectPolicy {
    /// Computes the delay to apply before the given reconnect attempt.
    ///
    /// `attempt` is 1-based: the nth attempt waits
    /// `min(initial_backoff * 2^(n-1), max_backoff)` plus optional jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_backoff;
        for _ in 1..attempt {
            delay = std::cmp::min(delay.saturating_mul(2), self.max_backoff);
        }
        std::cmp::min(delay, self.max_backoff) + jitter_duration(self.jitter, attempt)
    }

    /// Decides whether a further attempt is allowed after `completed` failed
    /// reconnects.
    pub fn next_attempt(&self, completed: u32) -> ReconnectDecision {
        if completed >= self.max_attempts {
            return ReconnectDecision::GiveUp;
        }
        ReconnectDecision::Retry {
            delay: self.delay_for_attempt(completed + 1),
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            jitter: Duration::ZERO,
        }
    }
}

fn jitter_duration(max_jitter: Duration, attempt: u32) -> Duration {
    if max_jitter.is_zero() {
        return Duration::ZERO;
    }

    let limit_nanos = max_jitter.as_nanos().min(u64::MAX as u128) as u64;
    if limit_nanos == 0 {
        return Duration::ZERO;
    }

    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    let mixed = now_nanos ^ (u64::from(attempt).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    Duration::from_nanos(mixed % (limit_nanos + 1))
}
