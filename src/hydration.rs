pub mod polling;
pub mod pull;

use crate::error::ErrorKind;
use crate::store::CacheEntry;
use std::time::Duration;
use tokio::time::Instant;

/// What asked for a fetch. Regaining focus is never a trigger.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Trigger {
    /// First attach for a key.
    Mount,
    /// The subscription moved to a different key.
    KeyChange,
    /// Proactive refresh from the polling timer.
    Interval,
    /// Explicit request from the consumer.
    Manual,
}

impl Trigger {
    pub fn should_fetch<T>(&self, entry: Option<&CacheEntry<T>>, now: Instant) -> bool {
        match self {
            Trigger::Mount => entry.map_or(true, |entry| entry.is_expired(now)),
            Trigger::KeyChange | Trigger::Interval | Trigger::Manual => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// `retries_done` counts retries already made, not the initial attempt.
    pub fn should_retry(&self, kind: ErrorKind, retries_done: u32) -> bool {
        kind.is_retryable() && retries_done < self.max_retries
    }

    /// Linear backoff: the n-th retry waits n times the base delay.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.delay * retry
    }
}
