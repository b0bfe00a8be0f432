//! Blocks client addresses that fail to log in too many times in a row.

use std::{net::IpAddr, time::Duration};

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct FailedAttempts {
    count: u32,
    last_failure: Instant,
}

/// Counts consecutive failed log-in attempts per client address.
///
/// Once an address reaches the attempt limit it is blocked until the block
/// duration has passed since its most recent failure. A successful log-in
/// clears the address's count.
#[derive(Debug)]
pub struct LoginLimiter {
    attempts: DashMap<IpAddr, FailedAttempts>,
    max_attempts: u32,
    block_duration: Duration,
}

impl LoginLimiter {
    /// Create a limiter that blocks an address after `max_attempts` consecutive
    /// failures, for `block_duration` after the last failure.
    pub fn new(max_attempts: u32, block_duration: Duration) -> Self {
        Self {
            attempts: DashMap::new(),
            max_attempts,
            block_duration,
        }
    }

    /// The number of consecutive failures before an address is blocked.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Record a failed log-in from `ip` and return its consecutive failure count.
    pub fn record_failure(&self, ip: IpAddr) -> u32 {
        let now = Instant::now();
        let mut entry = self.attempts.entry(ip).or_insert(FailedAttempts {
            count: 0,
            last_failure: now,
        });

        entry.count = entry.count.saturating_add(1);
        entry.last_failure = now;

        if entry.count == self.max_attempts {
            tracing::warn!(
                "Blocking log-ins from {ip} for {} seconds after {} failed attempts",
                self.block_duration.as_secs(),
                entry.count
            );
        }

        entry.count
    }

    /// Clear the failure count for `ip` after a successful log-in.
    pub fn record_success(&self, ip: IpAddr) {
        self.attempts.remove(&ip);
    }

    /// The consecutive failure count for `ip`.
    pub fn failed_attempts(&self, ip: IpAddr) -> u32 {
        self.attempts.get(&ip).map_or(0, |attempts| attempts.count)
    }

    /// How much longer `ip` is blocked for, or `None` if it is not blocked.
    pub fn remaining_block(&self, ip: IpAddr) -> Option<Duration> {
        let attempts = *self.attempts.get(&ip)?;

        if attempts.count < self.max_attempts {
            return None;
        }

        self.block_duration
            .checked_sub(attempts.last_failure.elapsed())
            .filter(|remaining| !remaining.is_zero())
    }

    /// Whether log-ins from `ip` should currently be refused.
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        self.remaining_block(ip).is_some()
    }
}
