//! Streaming
//!
//! - sse.rs: byte-level SSE decoder
//! - sse_json.rs: JSON payload stream on top of the decoder

pub mod sse;
pub mod sse_json;

pub use sse::{SseDecoder, SseEvent, decode_sse_stream};
pub use sse_json::{
    JsonSseStream, MalformedJsonPolicy, SseJsonStreamConfig, SseMessage, SsePayload,
    stream_sse_json_values,
};
