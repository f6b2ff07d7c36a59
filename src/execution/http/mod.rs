//! HTTP Utilities
//!
//! This module contains HTTP-related utilities:
//! - Transport abstraction and the reqwest-backed default
//! - Header management
//! - Retry-After parsing
//! - Per-attempt deadline and cancellation

pub mod headers;
pub mod retry_after;
pub mod timeout;
pub mod transport;

pub use headers::{build_request_headers, header_str, parse_headers};
pub use retry_after::{parse_retry_after, parse_retry_after_at, retry_after_from_headers};
pub use timeout::{AttemptScope, cancellable_sleep, run_attempt};
pub use transport::{
    HttpBody, HttpTransport, HttpTransportRequest, HttpTransportResponse, HttpTransportStreamBody,
    HttpTransportStreamResponse, ReqwestTransport, TransportError,
};
