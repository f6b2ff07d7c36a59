//! Per-call runtime configuration and request records.

use super::http::HttpConfig;
use crate::execution::executors::errors::{DefaultErrorNormalizer, ErrorNormalizer};
use crate::execution::http::transport::{
    HttpBody, HttpTransport, HttpTransportResponse, ReqwestTransport,
};
use crate::retry::RetryStrategy;
use crate::utils::cancel::CancelHandle;
use reqwest::Method;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Buffered response of a successful non-streaming call.
pub type HttpResponse = HttpTransportResponse;

/// One logical request. Every attempt of the call sends the same request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: HttpBody,
}

impl FetchRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: HttpBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, url).with_body(HttpBody::Json(body))
    }

    pub fn with_body(mut self, body: HttpBody) -> Self {
        self.body = body;
        self
    }

    /// Add a header; it overrides a configured header with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Runtime configuration of a call.
///
/// Cheap to clone. Clones share the retry strategy instance (which the
/// executor forks per call) and the lazily built default transport.
#[derive(Clone)]
pub struct FetchConfig {
    pub http: HttpConfig,
    pub retry_strategy: Option<Arc<dyn RetryStrategy>>,
    /// Custom transport; when unset a [`ReqwestTransport`] over
    /// [`HttpConfig::build_client`] is used.
    pub transport: Option<Arc<dyn HttpTransport>>,
    pub error_normalizer: Arc<dyn ErrorNormalizer>,
    pub cancel: Option<CancelHandle>,
    default_transport: Arc<OnceLock<Arc<dyn HttpTransport>>>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::new(HttpConfig::default())
    }
}

impl FetchConfig {
    pub fn new(http: HttpConfig) -> Self {
        Self {
            http,
            retry_strategy: None,
            transport: None,
            error_normalizer: Arc::new(DefaultErrorNormalizer),
            cancel: None,
            default_transport: Arc::new(OnceLock::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http.timeout = timeout;
        self
    }

    pub fn with_max_retry_after_secs(mut self, secs: u64) -> Self {
        self.http.max_retry_after_secs = secs;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.http.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_retry_strategy(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_error_normalizer(mut self, normalizer: Arc<dyn ErrorNormalizer>) -> Self {
        self.error_normalizer = normalizer;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.http.timeout
    }

    /// Transport for the next attempt: the custom one, or the default built on
    /// first use.
    pub fn resolve_transport(&self) -> Result<Arc<dyn HttpTransport>, reqwest::Error> {
        if let Some(transport) = &self.transport {
            return Ok(Arc::clone(transport));
        }
        if let Some(transport) = self.default_transport.get() {
            return Ok(Arc::clone(transport));
        }
        let client = self.http.build_client()?;
        let built: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(client));
        Ok(Arc::clone(self.default_transport.get_or_init(|| built)))
    }
}

impl fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchConfig")
            .field("http", &self.http)
            .field("retry_strategy", &self.retry_strategy)
            .field("custom_transport", &self.transport.is_some())
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}
