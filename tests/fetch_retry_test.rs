//! Non-streaming execution: retries, Retry-After, timeouts and cancellation.

mod support;

use llm_fetch::prelude::*;
use llm_fetch::retry::RetryAfterStrategy;
use std::sync::Arc;
use std::time::Duration;
use support::{ScriptedTransport, Step, ctx};
use tokio_test::{assert_err, assert_ok};

fn config(transport: &ScriptedTransport) -> FetchConfig {
    FetchConfig::default().with_transport(Arc::new(transport.clone()))
}

fn request() -> FetchRequest {
    FetchRequest::post_json("https://api.example.invalid/v1/chat", serde_json::json!({"q": 1}))
}

#[tokio::test(start_paused = true)]
async fn retry_after_hint_drives_the_single_retry() {
    let transport = ScriptedTransport::new([
        Step::status(429, r#"{"error":{"message":"slow down"}}"#).with_header("retry-after", "2"),
        Step::status(200, r#"{"ok":true}"#),
    ]);
    let cfg = config(&transport).with_retry_strategy(Arc::new(RetryAfterStrategy::new(
        2,
        Duration::from_secs(30),
    )));

    let response = assert_ok!(do_fetch(&request(), &cfg, &ctx()).await);

    assert_eq!(response.status, 200);
    assert_eq!(response.json::<serde_json::Value>(&ctx()).unwrap()["ok"], true);
    let offsets = transport.call_offsets_ms();
    assert_eq!(offsets.len(), 2);
    assert!((2000..2100).contains(&offsets[1]), "{offsets:?}");
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_return_the_last_error() {
    let transport = ScriptedTransport::new([
        Step::status(503, "fail 1"),
        Step::status(503, "fail 2"),
        Step::status(503, "fail 3"),
        Step::status(200, "{}"),
    ]);
    let cfg = config(&transport)
        .with_retry_strategy(Arc::new(LinearBackoff::new(3, Duration::from_millis(100))));

    let err = assert_err!(do_fetch(&request(), &cfg, &ctx()).await);

    assert_eq!(transport.call_count(), 3);
    assert!(matches!(err, LlmError::ProviderError { status: Some(503), .. }));
    assert!(err.to_string().contains("fail 3"), "{err}");
    assert_eq!(transport.call_offsets_ms(), vec![0, 100, 300]);
}

#[tokio::test(start_paused = true)]
async fn terminal_errors_are_not_retried() {
    let transport = ScriptedTransport::new([Step::status(401, "bad key"), Step::status(200, "{}")]);
    let cfg = config(&transport).with_retry_strategy(Arc::new(
        RetryAfterStrategy::new(5, Duration::from_millis(10)),
    ));

    let err = assert_err!(do_fetch(&request(), &cfg, &ctx()).await);

    assert!(matches!(err, LlmError::AuthenticationError { status: Some(401), .. }));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_attempt_is_retried() {
    let transport = ScriptedTransport::new([Step::Hang, Step::status(200, "{}")]);
    let strategy = ExponentialBackoff::new(3, Duration::from_millis(100), Duration::from_secs(1))
        .with_jitter(false);
    let cfg = config(&transport)
        .with_timeout(Duration::from_secs(1))
        .with_retry_strategy(Arc::new(strategy));

    assert_ok!(do_fetch(&request(), &cfg, &ctx()).await);

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].request.cancel.is_cancelled(), "aborted attempt token fires");
    let offsets = transport.call_offsets_ms();
    assert!((1100..1200).contains(&offsets[1]), "{offsets:?}");
}

#[tokio::test(start_paused = true)]
async fn timeout_without_strategy_is_a_timeout_error() {
    let transport = ScriptedTransport::new([Step::Hang]);
    let cfg = config(&transport).with_timeout(Duration::from_millis(500));

    let err = assert_err!(do_fetch(&request(), &cfg, &ctx()).await);

    assert!(matches!(err, LlmError::TimeoutError { timeout_ms: 500, .. }));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn network_failures_are_normalized_and_retried() {
    let transport = ScriptedTransport::new([
        Step::NetworkFailure("connection reset"),
        Step::status(200, "{}"),
    ]);
    let cfg = config(&transport)
        .with_retry_strategy(Arc::new(LinearBackoff::new(2, Duration::from_millis(50))));

    assert_ok!(do_fetch(&request(), &cfg, &ctx()).await);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn network_failure_keeps_its_cause() {
    let transport = ScriptedTransport::new([Step::NetworkFailure("connection reset")]);
    let cfg = config(&transport);

    let err = assert_err!(do_fetch(&request(), &cfg, &ctx()).await);

    match &err {
        LlmError::NetworkError { message, cause, .. } => {
            assert!(message.contains("connection reset"));
            assert!(cause.is_some());
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn typed_transport_errors_pass_through_verbatim() {
    let typed = LlmError::QuotaExceeded {
        context: ErrorContext::new("custom", Modality::Embedding),
        status: Some(402),
        message: "out of credits".into(),
    };
    let transport = ScriptedTransport::new([Step::Typed(typed)]);
    let cfg = config(&transport);

    let err = assert_err!(do_fetch(&request(), &cfg, &ctx()).await);

    assert!(matches!(err, LlmError::QuotaExceeded { status: Some(402), .. }));
    assert_eq!(err.provider(), "custom");
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_unwinds_promptly() {
    let transport = ScriptedTransport::new([
        Step::status(503, "busy").with_header("retry-after", "30"),
        Step::status(200, "{}"),
    ]);
    let cancel = CancelHandle::new();
    let cfg = config(&transport)
        .with_cancel(cancel.clone())
        .with_retry_strategy(Arc::new(RetryAfterStrategy::new(3, Duration::from_secs(1))));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = assert_err!(do_fetch(&request(), &cfg, &ctx()).await);

    assert!(matches!(err, LlmError::Cancelled { .. }));
    assert_eq!(transport.call_count(), 1);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn pre_cancelled_call_makes_no_attempt() {
    let transport = ScriptedTransport::new([Step::status(200, "{}")]);
    let cancel = CancelHandle::new();
    cancel.cancel();
    let cfg = config(&transport).with_cancel(cancel);

    let err = assert_err!(do_fetch(&request(), &cfg, &ctx()).await);

    assert!(matches!(err, LlmError::Cancelled { .. }));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn attempts_share_request_id_and_merged_headers() {
    let transport = ScriptedTransport::new([Step::status(500, "oops"), Step::status(200, "{}")]);
    let cfg = config(&transport)
        .with_header("Authorization", "Bearer config")
        .with_header("X-Client", "llm-fetch")
        .with_retry_strategy(Arc::new(LinearBackoff::new(2, Duration::from_millis(10))));
    let req = request().with_header("authorization", "Bearer request");

    assert_ok!(do_fetch(&req, &cfg, &ctx()).await);

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].request.request_id, calls[1].request.request_id);
    for call in &calls {
        let headers = &call.request.headers;
        assert_eq!(headers.get("authorization").unwrap(), "Bearer request");
        assert_eq!(headers.get("x-client").unwrap(), "llm-fetch");
        assert!(matches!(call.request.body, HttpBody::Json(_)));
    }

    assert_ok!(do_fetch(&req, &cfg, &ctx()).await);
    assert_ne!(transport.calls()[2].request.request_id, calls[0].request.request_id);
}

#[tokio::test]
async fn invalid_header_fails_before_any_attempt() {
    let transport = ScriptedTransport::new([Step::status(200, "{}")]);
    let cfg = config(&transport);
    let req = request().with_header("bad header", "x");

    let err = assert_err!(do_fetch(&req, &cfg, &ctx()).await);

    assert!(matches!(err, LlmError::InvalidRequest { .. }));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_do_not_share_retry_after_hints() {
    let shared: Arc<dyn RetryStrategy> =
        Arc::new(RetryAfterStrategy::new(2, Duration::from_millis(100)));

    let hinted = ScriptedTransport::new([
        Step::status(429, "").with_header("retry-after", "5"),
        Step::status(200, "{}"),
    ]);
    let plain = ScriptedTransport::new([Step::status(503, ""), Step::status(200, "{}")]);
    let cfg_hinted = config(&hinted).with_retry_strategy(shared.clone());
    let cfg_plain = config(&plain).with_retry_strategy(shared);

    let req = request();
    let (ctx_a, ctx_b) = (ctx(), ctx());
    let (a, b) = tokio::join!(
        do_fetch(&req, &cfg_hinted, &ctx_a),
        do_fetch(&req, &cfg_plain, &ctx_b)
    );
    assert_ok!(a);
    assert_ok!(b);

    assert_eq!(hinted.call_offsets_ms()[1], 5000);
    assert_eq!(plain.call_offsets_ms()[1], 100);
}

#[tokio::test(start_paused = true)]
async fn token_bucket_spaces_out_calls() {
    let transport = ScriptedTransport::new([]);
    let bucket = Arc::new(TokenBucket::new(1, 1.0));
    let strategy = RateLimited::new(bucket, Arc::new(NoRetry));
    let cfg = config(&transport).with_retry_strategy(Arc::new(strategy));

    for _ in 0..3 {
        assert_ok!(do_fetch(&request(), &cfg, &ctx()).await);
    }

    assert_eq!(transport.call_offsets_ms(), vec![0, 1000, 2000]);
}

#[tokio::test(start_paused = true)]
async fn unparseable_retry_after_falls_back_to_strategy_delay() {
    let transport = ScriptedTransport::new([
        Step::status(429, "").with_header("retry-after", "later please"),
        Step::status(200, "{}"),
    ]);
    let cfg = config(&transport).with_retry_strategy(Arc::new(RetryAfterStrategy::new(
        2,
        Duration::from_millis(750),
    )));

    assert_ok!(do_fetch(&request(), &cfg, &ctx()).await);
    assert_eq!(transport.call_offsets_ms(), vec![0, 750]);
}

#[tokio::test(start_paused = true)]
async fn retry_after_is_clamped_to_configured_maximum() {
    let transport = ScriptedTransport::new([
        Step::status(429, "").with_header("retry-after", "86400"),
        Step::status(200, "{}"),
    ]);
    let cfg = config(&transport)
        .with_max_retry_after_secs(3)
        .with_retry_strategy(Arc::new(RetryAfterStrategy::new(2, Duration::from_millis(1))));

    assert_ok!(do_fetch(&request(), &cfg, &ctx()).await);
    assert_eq!(transport.call_offsets_ms(), vec![0, 3000]);
}

#[tokio::test(start_paused = true)]
async fn retry_after_hint_is_not_reused_for_a_later_failure() {
    let transport = ScriptedTransport::new([
        Step::status(429, "").with_header("retry-after", "5"),
        Step::status(503, "busy"),
        Step::status(200, "{}"),
    ]);
    let cfg = config(&transport).with_retry_strategy(Arc::new(RetryAfterStrategy::new(
        3,
        Duration::from_millis(100),
    )));

    assert_ok!(do_fetch(&request(), &cfg, &ctx()).await);
    assert_eq!(transport.call_offsets_ms(), vec![0, 5000, 5100]);
}
