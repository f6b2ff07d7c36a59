//! Conversions into `LlmError`.

use super::types::{ErrorContext, LlmError};
use std::sync::Arc;

impl LlmError {
    /// Normalize an error returned by a transport.
    ///
    /// Errors that are already an `LlmError` are kept verbatim; anything else is
    /// a raw transport failure and becomes a `NetworkError` wrapping it.
    pub fn from_transport(
        context: &ErrorContext,
        err: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        match err.downcast::<LlmError>() {
            Ok(llm) => *llm,
            Err(raw) => Self::NetworkError {
                context: context.clone(),
                message: raw.to_string(),
                cause: Some(Arc::from(raw)),
            },
        }
    }
}
