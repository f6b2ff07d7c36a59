//! Retry strategies
//! - strategy.rs: capability-set trait and per-call state
//! - backoff.rs: no-retry, linear and exponential backoff
//! - token_bucket.rs: admission control and its composition with retries
//! - retry_after.rs: server-hinted delays
//! - executor.rs: retry driver for arbitrary operations

pub mod backoff;
pub mod executor;
pub mod retry_after;
pub mod strategy;
pub mod token_bucket;

pub use backoff::{ExponentialBackoff, JitterSource, LinearBackoff, NoRetry};
pub use executor::{RetryExecutor, retry_with};
pub use retry_after::RetryAfterStrategy;
pub use strategy::{
    CallStrategy, Forkable, PreRequestDelay, Resettable, RetryAfterAware, RetryDecision,
    RetryStrategy,
};
pub use token_bucket::{RateLimited, TokenBucket};
