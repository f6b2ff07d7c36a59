//! HTTP Headers Utility
//!
//! Header merging for request attempts.

use crate::error::{ErrorContext, LlmError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;

/// Parse string headers into a `HeaderMap`, rejecting invalid names or values.
pub fn parse_headers(
    headers: &HashMap<String, String>,
    context: &ErrorContext,
) -> Result<HeaderMap, LlmError> {
    let mut out = HeaderMap::with_capacity(headers.len());
    apply_headers_strict(&mut out, headers, context)?;
    Ok(out)
}

/// Build the headers of one attempt: configured headers first, then
/// per-request headers, which win on conflicts (names are case-insensitive).
pub fn build_request_headers(
    config_headers: &HashMap<String, String>,
    request_headers: &HashMap<String, String>,
    context: &ErrorContext,
) -> Result<HeaderMap, LlmError> {
    let mut out = parse_headers(config_headers, context)?;
    apply_headers_strict(&mut out, request_headers, context)?;
    Ok(out)
}

fn apply_headers_strict(
    base: &mut HeaderMap,
    extra: &HashMap<String, String>,
    context: &ErrorContext,
) -> Result<(), LlmError> {
    for (key, value) in extra {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            LlmError::invalid_request(context.clone(), format!("Invalid header name '{key}': {e}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            LlmError::invalid_request(
                context.clone(),
                format!("Invalid value for header '{key}': {e}"),
            )
        })?;
        base.insert(name, value);
    }
    Ok(())
}

/// First value of `name`, if present and valid UTF-8.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
