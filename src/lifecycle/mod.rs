//! Connection lifecycle module.
//!
//! `ConnectionManager` adds, updates and deletes records and opens and
//! closes live client handles:
//! - `add` calls are serialized through one FIFO queue
//! - connect negotiates the gRPC channel and falls back to HTTP only
//! - handles are cached by connection id

pub mod manager;
pub mod negotiation;
pub mod notifier;

pub use manager::*;
pub use negotiation::*;
pub use notifier::*;
