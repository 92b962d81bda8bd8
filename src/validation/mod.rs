//! Connection validation module.
//!
//! Checks applied before a record enters the registry:
//! - Required fields per connection kind
//! - Case-insensitive name uniqueness
//! - Well-formed hyperlinks

pub mod record;

pub use record::*;
