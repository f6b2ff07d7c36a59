//! Utility modules.

pub mod cancel;
pub(crate) mod sync;

pub use cancel::{CancelHandle, cancellable_stream, make_cancellable_stream};
