//! Token-bucket admission control.
//!
//! The bucket is implemented as a virtual-time gate (GCRA): it stores only the
//! theoretical arrival time of the next request. Each admission reads and
//! advances that time under one lock, so concurrent callers get distinct,
//! increasing reservation slots and a burst never exceeds `max_tokens`.

use super::strategy::{Forkable, PreRequestDelay, Resettable, RetryAfterAware, RetryStrategy};
use crate::error::LlmError;
use crate::utils::sync::lock_unpoisoned;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

// Stand-in for "never" when a reservation would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Rate gate applied before every attempt.
///
/// `TokenBucket` does not retry anything by itself and is deliberately not
/// forkable: every call that shares an instance draws from the same bucket.
/// Combine it with a retry strategy through [`RateLimited`].
#[derive(Debug)]
pub struct TokenBucket {
    max_tokens: u32,
    refill_rate: f64,
    interval: Duration,
    burst: Duration,
    next_free: Mutex<Instant>,
}

impl TokenBucket {
    /// `refill_rate` is in tokens per second. A zero capacity is treated as
    /// one and a non-positive rate as one token per second. Intervals too
    /// long to represent saturate instead of panicking.
    pub fn new(max_tokens: u32, refill_rate: f64) -> Self {
        let max_tokens = max_tokens.max(1);
        let refill_rate = if refill_rate.is_finite() && refill_rate > 0.0 {
            refill_rate
        } else {
            1.0
        };
        let interval = Duration::try_from_secs_f64(1.0 / refill_rate).unwrap_or(Duration::MAX);
        Self {
            max_tokens,
            refill_rate,
            interval,
            burst: interval.checked_mul(max_tokens - 1).unwrap_or(Duration::MAX),
            next_free: Mutex::new(Instant::now()),
        }
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Reserve the next slot and return how long the caller must wait for it.
    pub fn reserve(&self) -> Duration {
        self.reserve_at(Instant::now())
    }

    fn reserve_at(&self, now: Instant) -> Duration {
        let mut next_free = lock_unpoisoned(&self.next_free);
        let earliest = next_free.checked_sub(self.burst).unwrap_or(now);
        let scheduled = earliest.max(now);
        *next_free = saturating_add((*next_free).max(now), self.interval);
        scheduled - now
    }
}

fn saturating_add(at: Instant, delay: Duration) -> Instant {
    at.checked_add(delay)
        .or_else(|| at.checked_add(FAR_FUTURE))
        .unwrap_or(at)
}

#[async_trait]
impl PreRequestDelay for TokenBucket {
    async fn before_request(&self) -> Duration {
        self.reserve()
    }
}

impl RetryStrategy for TokenBucket {
    fn on_retry(&self, _error: &LlmError, _attempt: u32) -> Option<Duration> {
        None
    }

    fn pre_request_delay(&self) -> Option<&dyn PreRequestDelay> {
        Some(self)
    }
}

/// A shared [`TokenBucket`] in front of a retry strategy.
///
/// Forking forks the inner strategy (when it supports it) and keeps the
/// bucket shared, so per-call hints stay isolated while the rate limit stays
/// global.
#[derive(Debug, Clone)]
pub struct RateLimited {
    bucket: Arc<TokenBucket>,
    inner: Arc<dyn RetryStrategy>,
}

impl RateLimited {
    pub fn new(bucket: Arc<TokenBucket>, inner: Arc<dyn RetryStrategy>) -> Self {
        Self { bucket, inner }
    }

    pub fn bucket(&self) -> &Arc<TokenBucket> {
        &self.bucket
    }

    pub fn inner(&self) -> &Arc<dyn RetryStrategy> {
        &self.inner
    }
}

#[async_trait]
impl PreRequestDelay for RateLimited {
    async fn before_request(&self) -> Duration {
        let gate = self.bucket.reserve();
        match self.inner.pre_request_delay() {
            Some(inner) => gate.max(inner.before_request().await),
            None => gate,
        }
    }
}

impl Forkable for RateLimited {
    fn fork(&self) -> Arc<dyn RetryStrategy> {
        let inner = match self.inner.forkable() {
            Some(forkable) => forkable.fork(),
            None => Arc::clone(&self.inner),
        };
        Arc::new(Self {
            bucket: Arc::clone(&self.bucket),
            inner,
        })
    }
}

impl RetryStrategy for RateLimited {
    fn on_retry(&self, error: &LlmError, attempt: u32) -> Option<Duration> {
        self.inner.on_retry(error, attempt)
    }

    fn pre_request_delay(&self) -> Option<&dyn PreRequestDelay> {
        Some(self)
    }

    fn retry_after_aware(&self) -> Option<&dyn RetryAfterAware> {
        self.inner.retry_after_aware()
    }

    fn resettable(&self) -> Option<&dyn Resettable> {
        self.inner.resettable()
    }

    fn forkable(&self) -> Option<&dyn Forkable> {
        Some(self)
    }
}
