//! HTTP transport abstraction.
//!
//! The executor never talks to `reqwest` directly: every attempt goes through
//! an [`HttpTransport`]. The default is [`ReqwestTransport`]; callers can
//! inject their own ("custom fetch") to route requests elsewhere or to return
//! synthetic responses in tests.

use crate::error::{ErrorContext, LlmError};
use crate::execution::executors::errors::ErrorNormalizer;
use crate::streaming::{JsonSseStream, SseJsonStreamConfig, stream_sse_json_values};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Error type returned by transports.
///
/// A transport may box an [`LlmError`] to report a failure that is already
/// classified; anything else is treated as a network failure.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Request body of one attempt.
#[derive(Debug, Clone, Default)]
pub enum HttpBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Bytes(Bytes),
}

/// Transport-level request data for a single attempt.
#[derive(Debug, Clone)]
pub struct HttpTransportRequest {
    /// Id of the logical call; identical across retries.
    pub request_id: String,
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: HttpBody,
    /// Fires when the attempt is aborted (deadline or caller cancellation) and
    /// when the attempt scope is released. For streaming requests the scope is
    /// released once the response head is returned, so a transport must not
    /// tie the lifetime of the body stream to this token.
    pub cancel: CancellationToken,
}

/// Buffered transport-level response.
#[derive(Debug, Clone)]
pub struct HttpTransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpTransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self, context: &ErrorContext) -> Result<T, LlmError> {
        serde_json::from_slice(&self.body).map_err(|e| LlmError::InvalidResponse {
            context: context.clone(),
            status: Some(self.status),
            message: format!("Failed to parse response JSON: {e}"),
            cause: Some(Arc::new(e)),
        })
    }
}

/// Streaming response body.
pub struct HttpTransportStreamBody {
    inner: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl HttpTransportStreamBody {
    /// A body that yields `bytes` as a single chunk.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self::from_stream(futures_util::stream::once(async move { Ok(bytes) }))
    }

    /// A body that yields each chunk of `chunks` in order.
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes>,
    {
        Self::from_stream(futures_util::stream::iter(
            chunks.into_iter().map(|c| Ok::<Bytes, TransportError>(c.into())),
        ))
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes, TransportError>> {
        self.inner
    }
}

impl fmt::Debug for HttpTransportStreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransportStreamBody").finish_non_exhaustive()
    }
}

/// Transport-level response whose body has not been read.
#[derive(Debug)]
pub struct HttpTransportStreamResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: HttpTransportStreamBody,
}

impl HttpTransportStreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drain the whole body into memory.
    pub async fn collect(self, context: &ErrorContext) -> Result<HttpTransportResponse, LlmError> {
        let status = self.status;
        let headers = self.headers;
        let chunks: Vec<Bytes> = self
            .body
            .into_stream()
            .try_collect()
            .await
            .map_err(|e| LlmError::from_transport(context, e))?;
        Ok(HttpTransportResponse {
            status,
            headers,
            body: Bytes::from(chunks.concat()),
        })
    }

    /// Return the response unchanged if it is 2xx; otherwise drain the body and
    /// return the normalized error.
    pub async fn error_for_status(
        self,
        normalizer: &dyn ErrorNormalizer,
        context: &ErrorContext,
    ) -> Result<Self, LlmError> {
        if self.is_success() {
            return Ok(self);
        }
        let response = self.collect(context).await?;
        Err(normalizer.normalize(
            context,
            response.status,
            &response.headers,
            &response.text(),
        ))
    }

    /// Decode the body as a stream of SSE JSON messages.
    pub fn into_sse_json(self, config: SseJsonStreamConfig) -> JsonSseStream {
        stream_sse_json_values(self.body.into_stream(), config)
    }
}

/// Custom HTTP transport.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request and buffer the full response body.
    async fn execute(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportResponse, TransportError>;

    /// Send the request and return as soon as the response head is available.
    async fn execute_stream(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportStreamResponse, TransportError>;
}

/// Default transport backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn builder(&self, request: HttpTransportRequest) -> reqwest::RequestBuilder {
        let rb = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        match request.body {
            HttpBody::Empty => rb,
            HttpBody::Json(json) => rb.json(&json),
            HttpBody::Bytes(bytes) => rb.body(bytes),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportResponse, TransportError> {
        let resp = self.builder(request).send().await?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        Ok(HttpTransportResponse {
            status,
            headers,
            body,
        })
    }

    async fn execute_stream(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportStreamResponse, TransportError> {
        let resp = self.builder(request).send().await?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Box::new(e) as TransportError));
        Ok(HttpTransportStreamResponse {
            status,
            headers,
            body: HttpTransportStreamBody::from_stream(body),
        })
    }
}
