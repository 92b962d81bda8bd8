//! Filter groups and their compilation to backend queries.
//!
//! A `FilterGroup` is a boolean expression tree of leaf predicates under
//! AND/OR/NOT. Every editing primitive returns a new tree; nothing here
//! mutates a shared instance.

pub mod compiler;
pub mod group;
pub mod query;

pub use compiler::*;
pub use group::*;
pub use query::*;
