//! Security module.
//!
//! Keeps credentials out of log lines and user-facing messages.

pub mod redact;

pub use redact::*;
