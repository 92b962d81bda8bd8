//! Storage module.
//!
//! Connection record models, the durable blob-store seam and the
//! `ConnectionStore` that owns the canonical list.

pub mod models;
pub mod persistent;
pub mod store;

pub use models::*;
pub use persistent::*;
pub use store::*;
