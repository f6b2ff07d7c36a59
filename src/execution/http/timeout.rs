//! Per-attempt deadline and cancellation.
//!
//! An [`AttemptScope`] merges two abort sources into one token: the attempt's
//! deadline and the caller's [`CancelHandle`]. The merged token is a child of
//! the caller's token, so caller cancellation propagates into the attempt but
//! a deadline abort never cancels the caller's handle.
//!
//! Release is structural: the deadline timer lives inside the future returned
//! by [`run_attempt`], and dropping the scope cancels the merged token and
//! unregisters it from the parent. Every exit path (success, error, abort, or
//! the caller dropping the future) goes through the same drop.

use crate::error::{ErrorContext, LlmError};
use crate::utils::cancel::CancelHandle;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Merged abort signal owned by exactly one attempt.
#[derive(Debug)]
pub struct AttemptScope {
    merged: CancellationToken,
    external: Option<CancelHandle>,
}

impl AttemptScope {
    /// Open a scope under the caller's handle, if any.
    pub fn open(external: Option<&CancelHandle>) -> Self {
        let merged = match external {
            Some(handle) => handle.child_token(),
            None => CancellationToken::new(),
        };
        Self {
            merged,
            external: external.cloned(),
        }
    }

    /// Token handed to the transport for this attempt.
    pub fn token(&self) -> CancellationToken {
        self.merged.clone()
    }

    /// Whether the caller's handle has fired.
    fn externally_cancelled(&self) -> bool {
        self.external
            .as_ref()
            .is_some_and(|handle| handle.is_cancelled())
    }

    fn abort_error(&self, context: &ErrorContext, timeout: Duration) -> LlmError {
        if self.externally_cancelled() {
            LlmError::cancelled(context.clone())
        } else {
            LlmError::timeout(context.clone(), timeout.as_millis() as u64)
        }
    }
}

impl Drop for AttemptScope {
    fn drop(&mut self) {
        self.merged.cancel();
    }
}

/// Run one attempt under a deadline and the caller's cancellation handle.
///
/// `start` receives the merged token and builds the attempt future. It is not
/// called at all when the handle is already cancelled.
pub async fn run_attempt<T, F, Fut>(
    timeout: Duration,
    cancel: Option<&CancelHandle>,
    context: &ErrorContext,
    start: F,
) -> Result<T, LlmError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    if cancel.is_some_and(|handle| handle.is_cancelled()) {
        return Err(LlmError::cancelled(context.clone()));
    }

    let scope = AttemptScope::open(cancel);
    let attempt = start(scope.token());
    tokio::pin!(attempt);

    tokio::select! {
        biased;
        _ = scope.merged.cancelled() => Err(scope.abort_error(context, timeout)),
        _ = tokio::time::sleep(timeout) => {
            scope.merged.cancel();
            Err(scope.abort_error(context, timeout))
        }
        result = &mut attempt => result,
    }
}

/// Sleep for `delay` unless the caller cancels first.
pub async fn cancellable_sleep(
    delay: Duration,
    cancel: Option<&CancelHandle>,
    context: &ErrorContext,
) -> Result<(), LlmError> {
    if delay.is_zero() {
        return match cancel {
            Some(handle) if handle.is_cancelled() => Err(LlmError::cancelled(context.clone())),
            _ => Ok(()),
        };
    }
    match cancel {
        Some(handle) => tokio::select! {
            biased;
            _ = handle.cancelled() => Err(LlmError::cancelled(context.clone())),
            _ = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}
