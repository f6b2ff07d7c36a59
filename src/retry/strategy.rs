//! Retry strategy contract.
//!
//! A [`RetryStrategy`] always answers "retry after how long, if at all" for a
//! failed attempt. Everything else is an optional capability, exposed through
//! typed queries that return `None` when the strategy does not support it:
//!
//! | capability          | query                  | used for                                   |
//! |---------------------|------------------------|--------------------------------------------|
//! | [`PreRequestDelay`] | `pre_request_delay()`  | admission control before every attempt     |
//! | [`RetryAfterAware`] | `retry_after_aware()`  | receiving server `Retry-After` hints       |
//! | [`Resettable`]      | `resettable()`         | clearing backoff state after a success     |
//! | [`Forkable`]        | `forkable()`           | isolating per-call state between calls     |
//!
//! [`CallStrategy`] is the per-call view the executors drive.

use crate::error::LlmError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Pluggable retry policy.
pub trait RetryStrategy: Send + Sync + fmt::Debug {
    /// Delay before retrying after `error` on attempt number `attempt`
    /// (starting at 1), or `None` to stop.
    fn on_retry(&self, error: &LlmError, attempt: u32) -> Option<Duration>;

    fn pre_request_delay(&self) -> Option<&dyn PreRequestDelay> {
        None
    }

    fn retry_after_aware(&self) -> Option<&dyn RetryAfterAware> {
        None
    }

    fn resettable(&self) -> Option<&dyn Resettable> {
        None
    }

    fn forkable(&self) -> Option<&dyn Forkable> {
        None
    }
}

/// Gate awaited before every attempt.
#[async_trait]
pub trait PreRequestDelay: Send + Sync {
    /// Reserve admission and return how long to wait before sending.
    async fn before_request(&self) -> Duration;
}

/// Receives `Retry-After` hints (already clamped, in seconds).
pub trait RetryAfterAware: Send + Sync {
    fn set_retry_after(&self, seconds: u64);
}

/// Clears state accumulated by failed attempts.
pub trait Resettable: Send + Sync {
    fn reset(&self);
}

/// Produces a copy with fresh per-call state.
///
/// The fork shares configuration and any intentionally global state (such as
/// a rate-limit bucket) with the original.
pub trait Forkable: Send + Sync {
    fn fork(&self) -> Arc<dyn RetryStrategy>;
}

/// Outcome of consulting the strategy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// The strategy instance owned by one logical call.
#[derive(Debug, Clone, Default)]
pub struct CallStrategy {
    strategy: Option<Arc<dyn RetryStrategy>>,
}

impl CallStrategy {
    /// Fork the configured strategy when it supports forking; otherwise use
    /// it as-is, since it has no per-call state to isolate.
    pub fn for_call(configured: Option<&Arc<dyn RetryStrategy>>) -> Self {
        let strategy = configured.map(|s| match s.forkable() {
            Some(forkable) => forkable.fork(),
            None => Arc::clone(s),
        });
        Self { strategy }
    }

    /// Delay to apply before the next attempt.
    pub async fn admit(&self) -> Duration {
        match self.strategy.as_ref().and_then(|s| s.pre_request_delay()) {
            Some(gate) => gate.before_request().await,
            None => Duration::ZERO,
        }
    }

    /// Forward a parsed `Retry-After` hint, if there is one.
    pub fn record_retry_after(&self, seconds: Option<u64>) {
        if let (Some(seconds), Some(aware)) = (
            seconds,
            self.strategy.as_ref().and_then(|s| s.retry_after_aware()),
        ) {
            aware.set_retry_after(seconds);
        }
    }

    /// Decide whether to retry. Terminal errors never are.
    pub fn decide(&self, error: &LlmError, attempt: u32) -> RetryDecision {
        if error.is_terminal() {
            return RetryDecision::GiveUp;
        }
        match self.strategy.as_ref().and_then(|s| s.on_retry(error, attempt)) {
            Some(delay) => RetryDecision::RetryAfter(delay),
            None => RetryDecision::GiveUp,
        }
    }

    pub fn succeeded(&self) {
        if let Some(resettable) = self.strategy.as_ref().and_then(|s| s.resettable()) {
            resettable.reset();
        }
    }
}
