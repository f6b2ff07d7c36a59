//! Generic retry driver for arbitrary async operations.

use super::strategy::{CallStrategy, RetryDecision, RetryStrategy};
use crate::error::{ErrorContext, LlmError};
use crate::execution::http::timeout::cancellable_sleep;
use crate::utils::cancel::CancelHandle;
use std::future::Future;
use std::sync::Arc;

/// Runs an operation under a [`RetryStrategy`].
///
/// Each call to [`RetryExecutor::execute`] is one logical call: the strategy
/// is forked for it, the pre-request gate runs before every attempt, and
/// attempts never overlap.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    strategy: Option<Arc<dyn RetryStrategy>>,
    cancel: Option<CancelHandle>,
    context: ErrorContext,
}

impl RetryExecutor {
    pub fn new(strategy: Arc<dyn RetryStrategy>, context: ErrorContext) -> Self {
        Self {
            strategy: Some(strategy),
            cancel: None,
            context,
        }
    }

    /// Executor that runs every operation exactly once.
    pub fn without_retry(context: ErrorContext) -> Self {
        Self {
            strategy: None,
            cancel: None,
            context,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Execute `operation`, passing it the 1-based attempt number.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, LlmError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let call = CallStrategy::for_call(self.strategy.as_ref());
        let cancel = self.cancel.as_ref();
        let mut attempt = 1u32;

        loop {
            let gate = call.admit().await;
            cancellable_sleep(gate, cancel, &self.context).await?;

            match operation(attempt).await {
                Ok(value) => {
                    call.succeeded();
                    return Ok(value);
                }
                Err(error) => match call.decide(&error, attempt) {
                    RetryDecision::RetryAfter(delay) => {
                        tracing::debug!(
                            provider = %self.context.provider,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "operation failed, retrying"
                        );
                        cancellable_sleep(delay, cancel, &self.context).await?;
                        attempt = attempt.saturating_add(1);
                    }
                    RetryDecision::GiveUp => return Err(error),
                },
            }
        }
    }
}

/// Run `operation` under `strategy`.
pub async fn retry_with<F, Fut, T>(
    strategy: Arc<dyn RetryStrategy>,
    context: ErrorContext,
    operation: F,
) -> Result<T, LlmError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    RetryExecutor::new(strategy, context).execute(operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Modality;
    use crate::retry::{ExponentialBackoff, LinearBackoff, RetryAfterStrategy};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn ctx() -> ErrorContext {
        ErrorContext::new("test", Modality::Chat)
    }

    fn server_error(n: u32) -> LlmError {
        LlmError::provider_error(ctx(), Some(503), format!("unavailable #{n}"))
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let executor = RetryExecutor::new(
            Arc::new(LinearBackoff::new(5, Duration::from_millis(100))),
            ctx(),
        );
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let value = executor
            .execute(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(server_error(attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms after attempt 1, 200ms after attempt 2.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let strategy = ExponentialBackoff::new(3, Duration::from_millis(10), Duration::from_secs(1))
            .with_jitter(false);
        let err = retry_with(Arc::new(strategy), ctx(), |attempt| async move {
            Err::<(), _>(server_error(attempt))
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("unavailable #3"), "{err}");
    }

    #[tokio::test]
    async fn terminal_error_is_not_retried() {
        let executor = RetryExecutor::new(
            Arc::new(LinearBackoff::new(5, Duration::from_millis(1))),
            ctx(),
        );
        let calls = AtomicU32::new(0);
        let err = executor
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(LlmError::invalid_request(ctx(), "bad input")) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancelHandle::new();
        let executor = RetryExecutor::new(
            Arc::new(RetryAfterStrategy::new(5, Duration::from_secs(30))),
            ctx(),
        )
        .with_cancel(cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = executor
            .execute(|attempt| async move { Err::<(), _>(server_error(attempt)) })
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn without_retry_runs_once() {
        let executor = RetryExecutor::without_retry(ctx());
        let calls = AtomicU32::new(0);
        let _ = executor
            .execute(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(server_error(attempt)) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
