//! Core error types.
//!
//! `LlmError` is the closed taxonomy every failure is normalized into before it
//! reaches a retry strategy or a caller. Each variant carries the provider id
//! and modality of the call that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Shared, cloneable error cause.
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync>;

/// Kind of operation a request belongs to. Only used to label errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    #[default]
    Chat,
    Completion,
    Embedding,
    Image,
    Speech,
    Transcription,
    Rerank,
    Moderation,
    Files,
    Models,
    Other,
}

impl Modality {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Completion => "completion",
            Self::Embedding => "embedding",
            Self::Image => "image",
            Self::Speech => "speech",
            Self::Transcription => "transcription",
            Self::Rerank => "rerank",
            Self::Moderation => "moderation",
            Self::Files => "files",
            Self::Models => "models",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider and modality of the call an error belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorContext {
    pub provider: String,
    pub modality: Modality,
}

impl ErrorContext {
    pub fn new(provider: impl Into<String>, modality: Modality) -> Self {
        Self {
            provider: provider.into(),
            modality,
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.modality)
    }
}

/// Coarse error category, useful for presentation and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Quota,
    Client,
    Server,
    Network,
    Timeout,
    Cancelled,
    Parsing,
}

/// Unified error type.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("[{context}] authentication failed: {message}")]
    AuthenticationError {
        context: ErrorContext,
        status: Option<u16>,
        message: String,
    },

    #[error("[{context}] rate limited: {message}")]
    RateLimited {
        context: ErrorContext,
        status: Option<u16>,
        message: String,
    },

    #[error("[{context}] context length exceeded: {message}")]
    ContextLengthExceeded {
        context: ErrorContext,
        status: Option<u16>,
        message: String,
    },

    #[error("[{context}] model not found: {message}")]
    ModelNotFound {
        context: ErrorContext,
        status: Option<u16>,
        message: String,
    },

    #[error("[{context}] invalid request: {message}")]
    InvalidRequest {
        context: ErrorContext,
        status: Option<u16>,
        message: String,
    },

    #[error("[{context}] invalid response: {message}")]
    InvalidResponse {
        context: ErrorContext,
        status: Option<u16>,
        message: String,
        #[source]
        cause: Option<ErrorCause>,
    },

    #[error("[{context}] content filtered: {message}")]
    ContentFiltered {
        context: ErrorContext,
        status: Option<u16>,
        message: String,
    },

    #[error("[{context}] quota exceeded: {message}")]
    QuotaExceeded {
        context: ErrorContext,
        status: Option<u16>,
        message: String,
    },

    #[error("[{context}] provider error{}: {message}", status_suffix(.status))]
    ProviderError {
        context: ErrorContext,
        status: Option<u16>,
        message: String,
        error_code: Option<String>,
    },

    #[error("[{context}] network error: {message}")]
    NetworkError {
        context: ErrorContext,
        message: String,
        #[source]
        cause: Option<ErrorCause>,
    },

    #[error("[{context}] request timed out after {timeout_ms}ms")]
    TimeoutError { context: ErrorContext, timeout_ms: u64 },

    #[error("[{context}] request cancelled")]
    Cancelled { context: ErrorContext },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (http {s})")).unwrap_or_default()
}

impl LlmError {
    /// Wrap a raw transport failure.
    pub fn network<E>(context: ErrorContext, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::NetworkError {
            context,
            message: cause.to_string(),
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn timeout(context: ErrorContext, timeout_ms: u64) -> Self {
        Self::TimeoutError {
            context,
            timeout_ms,
        }
    }

    pub fn cancelled(context: ErrorContext) -> Self {
        Self::Cancelled { context }
    }

    pub fn invalid_request(context: ErrorContext, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            context,
            status: None,
            message: message.into(),
        }
    }

    pub fn invalid_response(context: ErrorContext, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            context,
            status: None,
            message: message.into(),
            cause: None,
        }
    }

    pub fn provider_error(
        context: ErrorContext,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::ProviderError {
            context,
            status,
            message: message.into(),
            error_code: None,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::AuthenticationError { context, .. }
            | Self::RateLimited { context, .. }
            | Self::ContextLengthExceeded { context, .. }
            | Self::ModelNotFound { context, .. }
            | Self::InvalidRequest { context, .. }
            | Self::InvalidResponse { context, .. }
            | Self::ContentFiltered { context, .. }
            | Self::QuotaExceeded { context, .. }
            | Self::ProviderError { context, .. }
            | Self::NetworkError { context, .. }
            | Self::TimeoutError { context, .. }
            | Self::Cancelled { context } => context,
        }
    }

    pub fn provider(&self) -> &str {
        &self.context().provider
    }

    pub fn modality(&self) -> Modality {
        self.context().modality
    }

    /// HTTP status of the response this error was normalized from, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::AuthenticationError { status, .. }
            | Self::RateLimited { status, .. }
            | Self::ContextLengthExceeded { status, .. }
            | Self::ModelNotFound { status, .. }
            | Self::InvalidRequest { status, .. }
            | Self::InvalidResponse { status, .. }
            | Self::ContentFiltered { status, .. }
            | Self::QuotaExceeded { status, .. }
            | Self::ProviderError { status, .. } => *status,
            Self::NetworkError { .. } | Self::TimeoutError { .. } | Self::Cancelled { .. } => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthenticationError { .. } => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::QuotaExceeded { .. } => ErrorCategory::Quota,
            Self::ContextLengthExceeded { .. }
            | Self::ModelNotFound { .. }
            | Self::InvalidRequest { .. }
            | Self::ContentFiltered { .. } => ErrorCategory::Client,
            Self::InvalidResponse { .. } => ErrorCategory::Parsing,
            Self::ProviderError { status, .. } => match status {
                Some(code) if (400..500).contains(code) => ErrorCategory::Client,
                _ => ErrorCategory::Server,
            },
            Self::NetworkError { .. } => ErrorCategory::Network,
            Self::TimeoutError { .. } => ErrorCategory::Timeout,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
        }
    }

    /// Whether the failure is transient and worth retrying with backoff.
    ///
    /// `InvalidResponse` is not included; strategies opt into it explicitly.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError { .. } | Self::TimeoutError { .. } | Self::RateLimited { .. } => {
                true
            }
            Self::ProviderError { status, .. } => status.is_none_or(|code| code >= 500),
            _ => false,
        }
    }

    /// Errors the executor never retries, whatever the strategy says.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationError { .. }
                | Self::InvalidRequest { .. }
                | Self::Cancelled { .. }
                | Self::ContextLengthExceeded { .. }
                | Self::ModelNotFound { .. }
                | Self::ContentFiltered { .. }
                | Self::QuotaExceeded { .. }
        )
    }
}
