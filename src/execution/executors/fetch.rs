//! Request executor
//!
//! `do_fetch` drives one logical non-streaming call: it forks the retry
//! strategy, applies the pre-request gate, runs each attempt under its own
//! deadline, normalizes failures and sleeps between attempts. Attempts are
//! strictly sequential.
//!
//! `do_stream_fetch` makes exactly one attempt and returns the response as
//! soon as its head arrives, whatever the status. A partially consumed stream
//! cannot be replayed, so streaming calls are never retried; interpreting the
//! status is left to the caller (see
//! [`HttpTransportStreamResponse::error_for_status`]).

use crate::error::{ErrorContext, LlmError};
use crate::execution::http::headers::build_request_headers;
use crate::execution::http::retry_after::retry_after_from_headers;
use crate::execution::http::timeout::{cancellable_sleep, run_attempt};
use crate::execution::http::transport::{
    HttpTransport, HttpTransportRequest, HttpTransportStreamBody, HttpTransportStreamResponse,
};
use crate::retry::{CallStrategy, RetryDecision};
use crate::types::{FetchConfig, FetchRequest, HttpResponse};
use crate::utils::cancel::cancellable_stream;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CACHE_CONTROL, HeaderMap, HeaderValue};
use std::sync::Arc;

/// Execute a non-streaming request with timeout, cancellation and retries.
///
/// Returns the first 2xx response, or the error of the last attempt once the
/// strategy gives up. Terminal errors (authentication, invalid request,
/// cancellation, ...) end the call immediately.
pub async fn do_fetch(
    request: &FetchRequest,
    config: &FetchConfig,
    context: &ErrorContext,
) -> Result<HttpResponse, LlmError> {
    let headers = build_request_headers(&config.http.headers, &request.headers, context)?;
    let transport = resolve_transport(config, context)?;
    let request_id = uuid::Uuid::new_v4().to_string();
    let call = CallStrategy::for_call(config.retry_strategy.as_ref());
    let cancel = config.cancel.as_ref();
    let timeout = config.timeout();

    let mut attempt: u32 = 1;
    loop {
        admit(&call, config, context, &request_id).await?;

        tracing::trace!(
            request_id = %request_id,
            provider = %context.provider,
            attempt,
            url = %request.url,
            "sending request"
        );
        let outcome = run_attempt(timeout, cancel, context, |token| {
            let transport = Arc::clone(&transport);
            let attempt_request = transport_request(request, &request_id, headers.clone(), token);
            async move {
                transport
                    .execute(attempt_request)
                    .await
                    .map_err(|e| LlmError::from_transport(context, e))
            }
        })
        .await;

        let error = match outcome {
            Ok(response) if response.is_success() => {
                call.succeeded();
                return Ok(response);
            }
            Ok(response) => {
                let error = config.error_normalizer.normalize(
                    context,
                    response.status,
                    &response.headers,
                    &response.text(),
                );
                call.record_retry_after(retry_after_from_headers(
                    &response.headers,
                    config.http.max_retry_after_secs,
                ));
                error
            }
            Err(error) => error,
        };

        match call.decide(&error, attempt) {
            RetryDecision::RetryAfter(delay) => {
                tracing::debug!(
                    request_id = %request_id,
                    provider = %context.provider,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "attempt failed, retrying"
                );
                cancellable_sleep(delay, cancel, context).await?;
                attempt = attempt.saturating_add(1);
            }
            RetryDecision::GiveUp => return Err(error),
        }
    }
}

/// Execute a streaming request: pre-request gate, then one attempt.
///
/// The deadline covers the attempt up to the response head. The body stays
/// bound to the caller's cancel handle, if one is configured.
pub async fn do_stream_fetch(
    request: &FetchRequest,
    config: &FetchConfig,
    context: &ErrorContext,
) -> Result<HttpTransportStreamResponse, LlmError> {
    let mut headers = build_request_headers(&config.http.headers, &request.headers, context)?;
    apply_stream_headers(&mut headers, config.http.stream_disable_compression);
    let transport = resolve_transport(config, context)?;
    let request_id = uuid::Uuid::new_v4().to_string();
    let call = CallStrategy::for_call(config.retry_strategy.as_ref());
    let cancel = config.cancel.as_ref();

    admit(&call, config, context, &request_id).await?;

    tracing::trace!(
        request_id = %request_id,
        provider = %context.provider,
        url = %request.url,
        "opening stream"
    );
    let response = run_attempt(config.timeout(), cancel, context, |token| {
        let attempt_request = transport_request(request, &request_id, headers, token);
        async move {
            transport
                .execute_stream(attempt_request)
                .await
                .map_err(|e| LlmError::from_transport(context, e))
        }
    })
    .await?;

    Ok(match cancel {
        Some(handle) => HttpTransportStreamResponse {
            status: response.status,
            headers: response.headers,
            body: HttpTransportStreamBody::from_stream(cancellable_stream(
                response.body.into_stream(),
                handle,
            )),
        },
        None => response,
    })
}

fn resolve_transport(
    config: &FetchConfig,
    context: &ErrorContext,
) -> Result<Arc<dyn HttpTransport>, LlmError> {
    config
        .resolve_transport()
        .map_err(|e| LlmError::network(context.clone(), e))
}

async fn admit(
    call: &CallStrategy,
    config: &FetchConfig,
    context: &ErrorContext,
    request_id: &str,
) -> Result<(), LlmError> {
    let delay = call.admit().await;
    if !delay.is_zero() {
        tracing::debug!(
            request_id = %request_id,
            provider = %context.provider,
            delay_ms = delay.as_millis() as u64,
            "waiting for rate limit admission"
        );
    }
    cancellable_sleep(delay, config.cancel.as_ref(), context).await
}

fn transport_request(
    request: &FetchRequest,
    request_id: &str,
    headers: HeaderMap,
    cancel: tokio_util::sync::CancellationToken,
) -> HttpTransportRequest {
    HttpTransportRequest {
        request_id: request_id.to_string(),
        method: request.method.clone(),
        url: request.url.clone(),
        headers,
        body: request.body.clone(),
        cancel,
    }
}

fn apply_stream_headers(headers: &mut HeaderMap, disable_compression: bool) {
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if disable_compression {
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    }
}
