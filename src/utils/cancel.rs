//! Cancellation utilities
//!
//! Provides first-class cancellation handles for requests and decoded streams.

use futures_util::Stream;
use futures_util::stream::BoxStream;
use tokio_util::sync::CancellationToken;

/// A handle that can be used to request cancellation.
///
/// Clones share the same signal. Pass it to `FetchConfig::with_cancel` to make
/// a logical call (every attempt and every backoff sleep) abort promptly.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Create a new cancel handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. In-flight attempts are aborted and dropping the
    /// attempt closes the underlying HTTP connection.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// A token that is cancelled with this handle but can also be cancelled on
    /// its own without affecting the handle.
    pub(crate) fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

/// Make any stream cancellable and return its cancel handle.
pub fn make_cancellable_stream<S, T>(stream: S) -> (BoxStream<'static, T>, CancelHandle)
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    let handle = CancelHandle::new();
    let cancellable = cancellable_stream(stream, &handle);
    (cancellable, handle)
}

/// Stop `stream` as soon as `handle` is cancelled.
pub fn cancellable_stream<S, T>(stream: S, handle: &CancelHandle) -> BoxStream<'static, T>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    let token = handle.token.clone();
    let s = async_stream::stream! {
        use futures_util::StreamExt;
        let mut inner = Box::pin(stream);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                item = inner.next() => {
                    let Some(item) = item else { break };
                    yield item;
                }
            }
        }
    };
    Box::pin(s)
}
