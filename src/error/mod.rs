//! Error Handling Module
//!
//! - Core error types (`LlmError`, `ErrorContext`, `Modality`, `ErrorCategory`)
//! - Conversions from transport-level failures
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_fetch::error::{ErrorContext, LlmError, Modality};
//!
//! let err = LlmError::timeout(ErrorContext::new("openai", Modality::Chat), 30_000);
//! assert!(err.is_retryable());
//! ```

mod conversions;
pub mod types;

pub use types::*;
