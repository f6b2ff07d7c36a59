//! Configuration and request/response records.

pub mod fetch;
pub mod http;

pub use fetch::{FetchConfig, FetchRequest, HttpResponse};
pub use http::{HttpConfig, HttpConfigBuilder};
