//! Structured logging with connection context.
//!
//! Provides the context prefix that every lifecycle and store log line
//! carries, so events for one connection can be grepped together.

pub mod structured;

pub use structured::*;
