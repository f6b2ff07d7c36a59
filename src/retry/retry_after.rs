//! Strategy that honors server `Retry-After` hints.

use super::strategy::{Forkable, Resettable, RetryAfterAware, RetryStrategy};
use crate::error::LlmError;
use crate::utils::sync::lock_unpoisoned;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Retries up to `max_attempts`, waiting for the `Retry-After` hint recorded
/// since the previous retry or `fallback_delay` when there is none.
///
/// A hint is used for one retry only: a later failure without its own hint
/// waits `fallback_delay`. The hint is per-call state: [`Forkable::fork`] returns an instance with the
/// same limits and no hint.
#[derive(Debug)]
pub struct RetryAfterStrategy {
    max_attempts: u32,
    fallback_delay: Duration,
    hint: Mutex<Option<Duration>>,
}

impl RetryAfterStrategy {
    pub fn new(max_attempts: u32, fallback_delay: Duration) -> Self {
        Self {
            max_attempts,
            fallback_delay,
            hint: Mutex::new(None),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn fallback_delay(&self) -> Duration {
        self.fallback_delay
    }

    /// Currently recorded hint.
    pub fn hint(&self) -> Option<Duration> {
        *lock_unpoisoned(&self.hint)
    }
}

impl RetryStrategy for RetryAfterStrategy {
    fn on_retry(&self, _error: &LlmError, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let hint = lock_unpoisoned(&self.hint).take();
        Some(hint.unwrap_or(self.fallback_delay))
    }

    fn retry_after_aware(&self) -> Option<&dyn RetryAfterAware> {
        Some(self)
    }

    fn resettable(&self) -> Option<&dyn Resettable> {
        Some(self)
    }

    fn forkable(&self) -> Option<&dyn Forkable> {
        Some(self)
    }
}

impl RetryAfterAware for RetryAfterStrategy {
    fn set_retry_after(&self, seconds: u64) {
        *lock_unpoisoned(&self.hint) = Some(Duration::from_secs(seconds));
    }
}

impl Resettable for RetryAfterStrategy {
    fn reset(&self) {
        *lock_unpoisoned(&self.hint) = None;
    }
}

impl Forkable for RetryAfterStrategy {
    fn fork(&self) -> Arc<dyn RetryStrategy> {
        Arc::new(Self::new(self.max_attempts, self.fallback_delay))
    }
}
