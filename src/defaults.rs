//! Default values shared across the crate.

pub mod http {
    use std::time::Duration;

    /// Per-attempt deadline.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(120_000);
    /// TCP/TLS connect timeout for the default reqwest client.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Upper bound applied to any Retry-After hint, in seconds.
    pub const MAX_RETRY_AFTER_SECS: u64 = 3600;
    pub const USER_AGENT: &str = concat!("llm-fetch/", env!("CARGO_PKG_VERSION"));
    /// Env var overriding `HttpConfig::stream_disable_compression`.
    pub const STREAM_DISABLE_COMPRESSION_ENV: &str = "LLM_FETCH_STREAM_DISABLE_COMPRESSION";
}

pub mod sse {
    /// Terminal sentinel emitted by OpenAI-style streams.
    pub const DONE_MARKER: &str = "[DONE]";
}
