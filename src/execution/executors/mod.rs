//! Executors
//!
//! - fetch.rs: the request executor (`do_fetch`, `do_stream_fetch`)
//! - errors.rs: HTTP error normalization

pub mod errors;
pub mod fetch;

pub use errors::{DefaultErrorNormalizer, ErrorNormalizer, classify_http_error};
pub use fetch::{do_fetch, do_stream_fetch};
