//! Failure-driven backoff strategies: no retry, linear and exponential.

use super::strategy::RetryStrategy;
use crate::error::LlmError;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn on_retry(&self, _error: &LlmError, _attempt: u32) -> Option<Duration> {
        None
    }
}

/// Waits `attempt * delay` between attempts.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl LinearBackoff {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl RetryStrategy for LinearBackoff {
    fn on_retry(&self, _error: &LlmError, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        self.delay.checked_mul(attempt)
    }
}

/// Source of uniform samples in `[0, 1)` used for jitter.
#[derive(Clone)]
pub struct JitterSource(Arc<dyn Fn() -> f64 + Send + Sync>);

impl JitterSource {
    /// Thread-local RNG.
    pub fn thread_rng() -> Self {
        Self(Arc::new(|| rand::thread_rng().r#gen::<f64>()))
    }

    /// Always returns `value`. Mostly useful in tests.
    pub fn fixed(value: f64) -> Self {
        Self(Arc::new(move || value))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    fn sample(&self) -> f64 {
        let v = (self.0)();
        if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
    }
}

impl Default for JitterSource {
    fn default() -> Self {
        Self::thread_rng()
    }
}

impl fmt::Debug for JitterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JitterSource")
    }
}

/// Exponential backoff over retryable errors.
///
/// Delay for attempt `k` is `min(max_delay, base_delay * 2^(k-1))`. With
/// jitter enabled it is scaled by a factor in `[0.5, 1.0]`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    /// Also retry `InvalidResponse` errors (truncated or garbled bodies).
    pub retry_invalid_response: bool,
    jitter_source: JitterSource,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            jitter: true,
            retry_invalid_response: false,
            jitter_source: JitterSource::default(),
        }
    }
}

impl ExponentialBackoff {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_jitter_source(mut self, source: JitterSource) -> Self {
        self.jitter_source = source;
        self
    }

    pub fn with_retry_invalid_response(mut self, retry: bool) -> Self {
        self.retry_invalid_response = retry;
        self
    }

    /// Whether `error` is eligible for a retry at all.
    pub fn should_retry(&self, error: &LlmError) -> bool {
        error.is_retryable()
            || (self.retry_invalid_response && matches!(error, LlmError::InvalidResponse { .. }))
    }

    /// Unjittered delay for `attempt`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        2u32.checked_pow(exp)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn on_retry(&self, error: &LlmError, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts || !self.should_retry(error) {
            return None;
        }
        let delay = self.base_delay_for(attempt);
        if self.jitter {
            Some(delay.mul_f64(0.5 + 0.5 * self.jitter_source.sample()))
        } else {
            Some(delay)
        }
    }
}
