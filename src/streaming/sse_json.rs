//! SSE JSON streaming helpers
//!
//! For providers that emit one JSON object per SSE `data:` payload. The
//! output is protocol-agnostic: providers parse the returned JSON into their
//! own event enums.

use super::sse::{SseEvent, decode_sse_stream};
use crate::defaults;
use crate::error::{ErrorContext, LlmError};
use crate::execution::http::transport::TransportError;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What to do with a `data:` payload that is not valid JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedJsonPolicy {
    /// Drop the payload and keep decoding.
    #[default]
    Skip,
    /// End the stream with an `InvalidResponse` error.
    Error,
}

#[derive(Debug, Clone)]
pub struct SseJsonStreamConfig {
    /// Label used in error messages (e.g. "openai chat" / "gemini").
    pub label: String,
    /// `data` payloads that mark the end of the stream.
    pub done_markers: Vec<String>,
    pub malformed_json: MalformedJsonPolicy,
    /// Context attached to errors produced by the stream.
    pub context: ErrorContext,
}

impl SseJsonStreamConfig {
    pub fn new(label: impl Into<String>, context: ErrorContext) -> Self {
        Self {
            label: label.into(),
            done_markers: vec![defaults::sse::DONE_MARKER.to_string()],
            malformed_json: MalformedJsonPolicy::default(),
            context,
        }
    }

    pub fn with_done_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.done_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_malformed_json(mut self, policy: MalformedJsonPolicy) -> Self {
        self.malformed_json = policy;
        self
    }
}

/// Decoded payload of one SSE event.
#[derive(Debug, Clone, PartialEq)]
pub enum SsePayload {
    Json(serde_json::Value),
    /// A configured done marker, verbatim.
    Done(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SseMessage {
    pub event: Option<String>,
    pub id: Option<String>,
    pub payload: SsePayload,
}

impl SseMessage {
    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.payload {
            SsePayload::Json(value) => Some(value),
            SsePayload::Done(_) => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.payload, SsePayload::Done(_))
    }
}

pub type JsonSseStream = BoxStream<'static, Result<SseMessage, LlmError>>;

/// Convert a bytes stream into a stream of JSON messages.
///
/// - Ignores empty payloads.
/// - Done markers are yielded as [`SsePayload::Done`]; decoding continues
///   after them.
/// - Malformed JSON is handled according to [`SseJsonStreamConfig::malformed_json`].
/// - A body error ends the stream with the normalized error.
pub fn stream_sse_json_values<S, B, E>(byte_stream: S, cfg: SseJsonStreamConfig) -> JsonSseStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TransportError> + Send + 'static,
{
    let out = async_stream::stream! {
        let mut events = decode_sse_stream(byte_stream, cfg.context.clone());
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            match to_message(event, &cfg) {
                Decoded::Message(message) => {
                    yield Ok(message);
                }
                Decoded::Skip => {}
                Decoded::Fail(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    };
    Box::pin(out)
}

enum Decoded {
    Message(SseMessage),
    Skip,
    Fail(LlmError),
}

fn to_message(event: SseEvent, cfg: &SseJsonStreamConfig) -> Decoded {
    let SseEvent {
        event: name,
        data,
        id,
        ..
    } = event;
    let payload = data.trim();
    if payload.is_empty() {
        return Decoded::Skip;
    }
    if let Some(marker) = cfg.done_markers.iter().find(|m| m.as_str() == payload) {
        return Decoded::Message(SseMessage {
            event: name,
            id,
            payload: SsePayload::Done(marker.clone()),
        });
    }

    match serde_json::from_str(payload) {
        Ok(value) => Decoded::Message(SseMessage {
            event: name,
            id,
            payload: SsePayload::Json(value),
        }),
        Err(e) => match cfg.malformed_json {
            MalformedJsonPolicy::Skip => {
                tracing::debug!(
                    label = %cfg.label,
                    provider = %cfg.context.provider,
                    error = %e,
                    "skipping malformed SSE JSON payload"
                );
                Decoded::Skip
            }
            MalformedJsonPolicy::Error => Decoded::Fail(LlmError::InvalidResponse {
                context: cfg.context.clone(),
                status: None,
                message: format!("Failed to parse SSE JSON ({}): {e}", cfg.label),
                cause: Some(Arc::new(e)),
            }),
        },
    }
}
