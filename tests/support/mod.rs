//! Scripted in-memory transport shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use llm_fetch::execution::http::{
    HttpTransport, HttpTransportRequest, HttpTransportResponse, HttpTransportStreamBody,
    HttpTransportStreamResponse, TransportError,
};
use llm_fetch::{ErrorContext, LlmError, Modality};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// What the transport does for one attempt.
pub enum Step {
    Respond {
        status: u16,
        headers: Vec<(&'static str, String)>,
        chunks: Vec<String>,
    },
    NetworkFailure(&'static str),
    Typed(LlmError),
    /// Never completes; only the attempt deadline or cancellation ends it.
    Hang,
    /// Head arrives, then the body yields `chunks` and never ends.
    OpenEnded(Vec<String>),
}

impl Step {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Step::Respond {
            status,
            headers: Vec::new(),
            chunks: vec![body.into()],
        }
    }

    pub fn with_header(self, name: &'static str, value: impl Into<String>) -> Self {
        match self {
            Step::Respond {
                status,
                mut headers,
                chunks,
            } => {
                headers.push((name, value.into()));
                Step::Respond {
                    status,
                    headers,
                    chunks,
                }
            }
            other => other,
        }
    }

    pub fn chunked(status: u16, chunks: &[&str]) -> Self {
        Step::Respond {
            status,
            headers: Vec::new(),
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Clone)]
pub struct RecordedCall {
    pub request: HttpTransportRequest,
    pub at: Instant,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    steps: Arc<Mutex<VecDeque<Step>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("lock").len()
    }

    /// Offsets of each call from the first one, in milliseconds.
    pub fn call_offsets_ms(&self) -> Vec<u128> {
        let calls = self.calls();
        let Some(first) = calls.first().map(|c| c.at) else {
            return Vec::new();
        };
        calls.iter().map(|c| (c.at - first).as_millis()).collect()
    }

    fn next_step(&self, request: HttpTransportRequest) -> Step {
        self.calls.lock().expect("lock").push(RecordedCall {
            request,
            at: Instant::now(),
        });
        self.steps
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Step::status(200, "{}"))
    }
}

fn header_map(headers: Vec<(&'static str, String)>) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        out.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(&value).expect("header value"),
        );
    }
    out
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportResponse, TransportError> {
        match self.next_step(request) {
            Step::Respond {
                status,
                headers,
                chunks,
            } => Ok(HttpTransportResponse {
                status,
                headers: header_map(headers),
                body: Bytes::from(chunks.concat()),
            }),
            Step::NetworkFailure(message) => {
                Err(Box::new(std::io::Error::new(std::io::ErrorKind::ConnectionReset, message)))
            }
            Step::Typed(error) => Err(Box::new(error)),
            Step::Hang | Step::OpenEnded(_) => std::future::pending().await,
        }
    }

    async fn execute_stream(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportStreamResponse, TransportError> {
        match self.next_step(request) {
            Step::Respond {
                status,
                headers,
                chunks,
            } => Ok(HttpTransportStreamResponse {
                status,
                headers: header_map(headers),
                body: HttpTransportStreamBody::from_chunks(chunks),
            }),
            Step::OpenEnded(chunks) => {
                let head = futures::stream::iter(
                    chunks
                        .into_iter()
                        .map(|c| Ok::<Bytes, TransportError>(Bytes::from(c))),
                );
                Ok(HttpTransportStreamResponse {
                    status: 200,
                    headers: HeaderMap::new(),
                    body: HttpTransportStreamBody::from_stream(
                        futures::StreamExt::chain(head, futures::stream::pending()),
                    ),
                })
            }
            Step::NetworkFailure(message) => {
                Err(Box::new(std::io::Error::new(std::io::ErrorKind::ConnectionReset, message)))
            }
            Step::Typed(error) => Err(Box::new(error)),
            Step::Hang => std::future::pending().await,
        }
    }
}

pub fn ctx() -> ErrorContext {
    ErrorContext::new("mock", Modality::Chat)
}
