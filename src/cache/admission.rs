//! Per-client admission control.
//!
//! Two gates run for every check, in order:
//!
//! 1. A fixed-window counter held in an [`ExpiringStore`] under
//!    `limiter:<client>`. Once it reaches `burst` the client is rejected until
//!    the window entry expires; the window is not extended by new requests.
//! 2. A per-client token bucket (capacity `burst`, refilled at `rate` tokens
//!    per second). The bucket is refilled to capacity whenever a window
//!    opens, so a fresh window always admits a full burst regardless of
//!    `rate`.
//!
//! Callers see a single [`AdmissionError::RateLimitExceeded`] whichever gate
//! refused.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::clock::{Clock, SystemClock};
use super::expiring::ExpiringStore;

const COUNTER_PREFIX: &str = "limiter:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("rate limit exceeded")]
    RateLimitExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionPolicy {
    /// Token refill rate, in tokens per second. Must be positive.
    pub rate: f64,
    /// Maximum admissions per window and token bucket capacity.
    pub burst: u32,
    /// Length of the fixed counting window.
    pub window: Duration,
}

impl AdmissionPolicy {
    /// Time for an empty bucket to refill completely, saturating at
    /// [`Duration::MAX`] for rates too slow to represent.
    fn refill_period(&self) -> Duration {
        Duration::try_from_secs_f64(f64::from(self.burst) / self.rate).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: f64,
    refilled_at: Instant,
}

impl TokenBucket {
    fn full(policy: &AdmissionPolicy, now: Instant) -> Self {
        Self {
            tokens: f64::from(policy.burst),
            refilled_at: now,
        }
    }

    fn try_take(&mut self, policy: &AdmissionPolicy, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.refilled_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * policy.rate).min(f64::from(policy.burst));
        self.refilled_at = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct AdmissionController {
    policy: AdmissionPolicy,
    counters: ExpiringStore<String, u32>,
    buckets: ExpiringStore<String, TokenBucket>,
}

impl AdmissionController {
    pub fn new(policy: AdmissionPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: AdmissionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            counters: ExpiringStore::with_clock(clock.clone()),
            buckets: ExpiringStore::with_clock(clock),
        }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Decide whether `client` may proceed, counting the attempt if the
    /// window still has room.
    pub fn check(&self, client: &str) -> Result<(), AdmissionError> {
        let policy = self.policy;
        let counter_key = counter_key(client);

        // The bucket is only touched while the counter entry is locked, so
        // the whole check is one atomic unit per store pair.
        self.counters.update(
            counter_key,
            policy.window,
            || 0,
            |count| {
                if *count >= policy.burst {
                    return Err(AdmissionError::RateLimitExceeded);
                }

                // A fresh window always starts from a full bucket.
                let now = self.buckets.now();
                let mut bucket = if *count == 0 {
                    TokenBucket::full(&policy, now)
                } else {
                    self.buckets
                        .get(&client.to_string())
                        .unwrap_or_else(|| TokenBucket::full(&policy, now))
                };
                *count += 1;
                let allowed = bucket.try_take(&policy, now);
                self.buckets
                    .set(client.to_string(), bucket, policy.refill_period());

                if allowed {
                    Ok(())
                } else {
                    Err(AdmissionError::RateLimitExceeded)
                }
            },
        )
    }

    /// Requests counted for `client` in its current window.
    pub fn count(&self, client: &str) -> u32 {
        self.counters.get(&counter_key(client)).unwrap_or(0)
    }

    /// Time until `client`'s current window closes.
    pub fn retry_after(&self, client: &str) -> Duration {
        self.counters
            .remaining_ttl(&counter_key(client))
            .unwrap_or(Duration::ZERO)
    }

    /// Sweep expired windows and buckets, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.counters.purge_expired() + self.buckets.purge_expired()
    }
}

fn counter_key(client: &str) -> String {
    format!("{COUNTER_PREFIX}{client}")
}
