//! HTTP error normalization
//!
//! Maps a non-2xx response (status, headers, body text) onto the error
//! taxonomy. Providers can plug in their own [`ErrorNormalizer`]; the default
//! one uses provider-agnostic status and body heuristics.

use crate::error::{ErrorContext, LlmError};
use crate::execution::http::headers::header_str;
use reqwest::header::HeaderMap;

/// Request/trace id headers echoed into error messages.
const REQUEST_ID_HEADERS: [&str; 7] = [
    "x-request-id",
    "x-response-id",
    "x-openai-request-id",
    "x-trace-id",
    "traceparent",
    "x-correlation-id",
    "x-goog-request-id",
];

const BODY_SAMPLE_CHARS: usize = 200;

/// Turns an HTTP failure into an [`LlmError`].
pub trait ErrorNormalizer: Send + Sync {
    fn normalize(
        &self,
        context: &ErrorContext,
        status: u16,
        headers: &HeaderMap,
        body_text: &str,
    ) -> LlmError;
}

impl<F> ErrorNormalizer for F
where
    F: Fn(&ErrorContext, u16, &HeaderMap, &str) -> LlmError + Send + Sync,
{
    fn normalize(
        &self,
        context: &ErrorContext,
        status: u16,
        headers: &HeaderMap,
        body_text: &str,
    ) -> LlmError {
        self(context, status, headers, body_text)
    }
}

/// Status and body-pattern heuristics shared by all providers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorNormalizer;

impl ErrorNormalizer for DefaultErrorNormalizer {
    fn normalize(
        &self,
        context: &ErrorContext,
        status: u16,
        headers: &HeaderMap,
        body_text: &str,
    ) -> LlmError {
        classify_http_error(context, status, headers, body_text)
    }
}

/// Classify an HTTP failure.
pub fn classify_http_error(
    context: &ErrorContext,
    status: u16,
    headers: &HeaderMap,
    body_text: &str,
) -> LlmError {
    let ctx = context.clone();
    let lower = body_text.to_lowercase();
    let detail = describe(status, headers, body_text);

    match status {
        429 => LlmError::RateLimited {
            context: ctx,
            status: Some(status),
            message: detail,
        },
        401 => LlmError::AuthenticationError {
            context: ctx,
            status: Some(status),
            message: detail,
        },
        404 => LlmError::ModelNotFound {
            context: ctx,
            status: Some(status),
            message: detail,
        },
        400 | 403 | 413 | 415 | 422 => {
            if is_quota_like(&lower) {
                LlmError::QuotaExceeded {
                    context: ctx,
                    status: Some(status),
                    message: detail,
                }
            } else if is_rate_like(&lower) {
                LlmError::RateLimited {
                    context: ctx,
                    status: Some(status),
                    message: detail,
                }
            } else if status == 403 {
                LlmError::AuthenticationError {
                    context: ctx,
                    status: Some(status),
                    message: detail,
                }
            } else if is_context_length_like(&lower) {
                LlmError::ContextLengthExceeded {
                    context: ctx,
                    status: Some(status),
                    message: detail,
                }
            } else if is_content_filter_like(&lower) {
                LlmError::ContentFiltered {
                    context: ctx,
                    status: Some(status),
                    message: detail,
                }
            } else {
                LlmError::InvalidRequest {
                    context: ctx,
                    status: Some(status),
                    message: detail,
                }
            }
        }
        _ => LlmError::ProviderError {
            context: ctx,
            status: Some(status),
            message: detail,
            error_code: extract_error_code(body_text),
        },
    }
}

fn describe(status: u16, headers: &HeaderMap, body_text: &str) -> String {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("error");
    let mut out = format!("http {status} {}", reason.to_lowercase());

    let ids: Vec<String> = REQUEST_ID_HEADERS
        .iter()
        .filter_map(|k| header_str(headers, k).map(|v| format!("{k}={v}")))
        .collect();
    if !ids.is_empty() {
        out.push_str(&format!(" ids=[{}]", ids.join(",")));
    }

    let sample: String = body_text.trim().chars().take(BODY_SAMPLE_CHARS).collect();
    if !sample.is_empty() {
        out.push_str(" body_sample=");
        out.push_str(&sample);
    }
    out
}

fn is_quota_like(lower: &str) -> bool {
    lower.contains("quota") || lower.contains("insufficient_quota") || lower.contains("billing")
}

fn is_rate_like(lower: &str) -> bool {
    [
        "rate limit",
        "ratelimit",
        "rate_limit",
        "resource_exhausted",
        "too many requests",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

fn is_context_length_like(lower: &str) -> bool {
    [
        "context length",
        "context_length",
        "context window",
        "maximum context",
        "max_tokens",
        "maximum number of tokens",
        "too many tokens",
        "prompt is too long",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

fn is_content_filter_like(lower: &str) -> bool {
    [
        "content_filter",
        "content filter",
        "content policy",
        "content_policy",
        "safety",
        "blocked",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

/// `error.code` or `error.type` from a JSON error envelope.
fn extract_error_code(body_text: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body_text).ok()?;
    let error = json.get("error")?;
    ["code", "type", "status"].iter().find_map(|k| match error.get(*k)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
