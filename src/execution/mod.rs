//! Request execution: HTTP plumbing and the executors built on it.

pub mod executors;
pub mod http;
