//! llm-fetch
//!
//! Provider-agnostic HTTP execution core for LLM clients: request execution
//! with per-attempt timeouts and cancellation, pluggable retry strategies,
//! Retry-After handling, and Server-Sent-Events decoding.
#![deny(unsafe_code)]

pub mod defaults;
pub mod error;
pub mod execution;
pub mod retry;
pub mod streaming;
pub mod types;
pub mod utils;

pub use error::{ErrorCategory, ErrorContext, LlmError, Modality};
pub use execution::executors::{DefaultErrorNormalizer, ErrorNormalizer, do_fetch, do_stream_fetch};
pub use execution::http::{HttpBody, HttpTransport, ReqwestTransport, parse_retry_after};
pub use types::{FetchConfig, FetchRequest, HttpConfig, HttpResponse};
pub use utils::CancelHandle;

/// Common imports for callers.
pub mod prelude {
    pub use crate::error::{ErrorContext, LlmError, Modality};
    pub use crate::execution::executors::{do_fetch, do_stream_fetch};
    pub use crate::execution::http::{
        HttpBody, HttpTransport, HttpTransportRequest, HttpTransportResponse,
        HttpTransportStreamBody, HttpTransportStreamResponse, TransportError,
    };
    pub use crate::retry::{
        ExponentialBackoff, LinearBackoff, NoRetry, RateLimited, RetryAfterStrategy,
        RetryStrategy, TokenBucket,
    };
    pub use crate::streaming::{MalformedJsonPolicy, SseJsonStreamConfig, SseMessage, SsePayload};
    pub use crate::types::{FetchConfig, FetchRequest, HttpConfig};
    pub use crate::utils::CancelHandle;
}
